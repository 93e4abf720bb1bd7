use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::input::InputError;
use crate::input::mtx::Entry;
use crate::simd;

/// Column-compressed gene x cell matrix; one column per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Csc<T> {
    pub n_genes: usize,
    pub n_cells: usize,
    pub col_ptr: Vec<u64>,
    pub row_idx: Vec<u32>,
    pub values: Vec<T>,
}

pub type CountMatrix = Csc<u32>;
pub type NormMatrix = Csc<f32>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellStats {
    pub libsize: u64,
    pub detected: u32,
}

impl<T: Copy> Csc<T> {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn cell_range(&self, cell: usize) -> Range<usize> {
        self.col_ptr[cell] as usize..self.col_ptr[cell + 1] as usize
    }

    pub fn cell(&self, cell: usize) -> (&[u32], &[T]) {
        let range = self.cell_range(cell);
        (&self.row_idx[range.clone()], &self.values[range])
    }

    pub fn iter_cell(&self, cell: usize) -> impl Iterator<Item = (u32, T)> + '_ {
        let (rows, vals) = self.cell(cell);
        rows.iter().copied().zip(vals.iter().copied())
    }

    /// Keeps the listed cells in the given order.
    pub fn subset_cells(&self, keep: &[usize]) -> Self {
        let nnz: usize = keep.iter().map(|&c| self.cell_range(c).len()).sum();
        let mut col_ptr = Vec::with_capacity(keep.len() + 1);
        let mut row_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        col_ptr.push(0u64);
        for &cell in keep {
            let (rows, vals) = self.cell(cell);
            row_idx.extend_from_slice(rows);
            values.extend_from_slice(vals);
            col_ptr.push(row_idx.len() as u64);
        }
        Self {
            n_genes: self.n_genes,
            n_cells: keep.len(),
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Keeps the listed genes; `keep` must be strictly increasing so row order is preserved.
    pub fn subset_genes(&self, keep: &[usize]) -> Self {
        debug_assert!(keep.windows(2).all(|w| w[0] < w[1]));
        let mut remap = vec![u32::MAX; self.n_genes];
        for (new, &old) in keep.iter().enumerate() {
            remap[old] = new as u32;
        }
        let mut col_ptr = Vec::with_capacity(self.n_cells + 1);
        let mut row_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        col_ptr.push(0u64);
        for cell in 0..self.n_cells {
            for (row, value) in self.iter_cell(cell) {
                let mapped = remap[row as usize];
                if mapped != u32::MAX {
                    row_idx.push(mapped);
                    values.push(value);
                }
            }
            col_ptr.push(row_idx.len() as u64);
        }
        Self {
            n_genes: keep.len(),
            n_cells: self.n_cells,
            col_ptr,
            row_idx,
            values,
        }
    }

    /// Number of cells with a stored entry, per gene.
    pub fn cells_per_gene(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.n_genes];
        for &row in &self.row_idx {
            counts[row as usize] += 1;
        }
        counts
    }

    pub fn genes_per_cell(&self) -> Vec<u32> {
        (0..self.n_cells)
            .map(|c| self.cell_range(c).len() as u32)
            .collect()
    }
}

impl CountMatrix {
    /// Builds the matrix from (column, row, count) entries. Zero counts are expected to be
    /// filtered already; a repeated coordinate is rejected.
    pub fn from_entries(
        n_genes: usize,
        n_cells: usize,
        mut entries: Vec<Entry>,
    ) -> Result<Self, InputError> {
        entries.sort_unstable_by_key(|&(col, row, _)| (col, row));

        let mut col_ptr = vec![0u64; n_cells + 1];
        for &(col, row, _) in &entries {
            if col as usize >= n_cells {
                return Err(InputError::InvalidMtxDimensions(
                    "column index out of bounds".to_string(),
                ));
            }
            if row as usize >= n_genes {
                return Err(InputError::InvalidMtxDimensions(
                    "row index out of bounds".to_string(),
                ));
            }
            col_ptr[col as usize + 1] += 1;
        }
        for i in 0..n_cells {
            col_ptr[i + 1] += col_ptr[i];
        }

        for pair in entries.windows(2) {
            if (pair[0].0, pair[0].1) == (pair[1].0, pair[1].1) {
                return Err(InputError::InvalidMtxDimensions(format!(
                    "duplicate entry for row {} column {}",
                    pair[0].1 + 1,
                    pair[0].0 + 1
                )));
            }
        }

        let (row_idx, values): (Vec<u32>, Vec<u32>) = entries.into_iter().map(|(_, row, v)| (row, v)).unzip();
        Ok(Self {
            n_genes,
            n_cells,
            col_ptr,
            row_idx,
            values,
        })
    }

    pub fn cell_stats(&self) -> Vec<CellStats> {
        (0..self.n_cells)
            .map(|cell| {
                let (_, vals) = self.cell(cell);
                CellStats {
                    libsize: simd::sum_u32(vals),
                    detected: vals.len() as u32,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/expr/csc.rs"]
mod tests;
