use rayon::prelude::*;

use crate::expr::csc::{CellStats, CountMatrix, NormMatrix};

/// `ln(1 + count / libsize * scale_factor)` for every stored entry, cell by cell.
pub fn log_normalize(counts: &CountMatrix, stats: &[CellStats], scale_factor: f64) -> NormMatrix {
    debug_assert_eq!(stats.len(), counts.n_cells);
    let per_cell: Vec<Vec<f32>> = (0..counts.n_cells)
        .into_par_iter()
        .map(|cell| {
            let (_, vals) = counts.cell(cell);
            let libsize = stats[cell].libsize as f64;
            if libsize == 0.0 {
                return vec![0.0; vals.len()];
            }
            let factor = scale_factor / libsize;
            vals.iter()
                .map(|&v| (v as f64 * factor).ln_1p() as f32)
                .collect()
        })
        .collect();

    let mut values = Vec::with_capacity(counts.nnz());
    for cell_values in per_cell {
        values.extend(cell_values);
    }

    NormMatrix {
        n_genes: counts.n_genes,
        n_cells: counts.n_cells,
        col_ptr: counts.col_ptr.clone(),
        row_idx: counts.row_idx.clone(),
        values,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/expr/normalize.rs"]
mod tests;
