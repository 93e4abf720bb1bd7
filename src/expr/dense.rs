use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Dense scaled expression for a subset of genes, stored cell-major
/// (`values[cell * n_genes + gene_pos]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledMatrix {
    /// Indices into the dataset gene axis, in column order.
    pub genes: Vec<usize>,
    pub n_cells: usize,
    pub values: Vec<f64>,
    pub gene_means: Vec<f64>,
    pub gene_sds: Vec<f64>,
    pub clip: Option<f64>,
}

impl ScaledMatrix {
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn cell(&self, cell: usize) -> &[f64] {
        let n = self.n_genes();
        &self.values[cell * n..(cell + 1) * n]
    }

    pub fn get(&self, gene_pos: usize, cell: usize) -> f64 {
        self.values[cell * self.n_genes() + gene_pos]
    }

    /// Cells x genes matrix for decomposition.
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.n_cells, self.n_genes(), &self.values)
    }
}
