use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::knn::Metric;

/// Principal components of the scaled matrix. Dense buffers are row-major:
/// `loadings[gene_pos * n_components + pc]`, `scores[cell * n_components + pc]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    /// Dataset gene indices, in loading row order.
    pub genes: Vec<usize>,
    pub n_cells: usize,
    pub n_components: usize,
    pub loadings: Vec<f64>,
    pub scores: Vec<f64>,
    pub stdev: Vec<f64>,
    pub variance: Vec<f64>,
    pub variance_ratio: Vec<f64>,
    pub total_variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElbowPoint {
    pub component: usize,
    pub stdev: f64,
    pub variance_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentLoadings {
    pub component: usize,
    /// (gene index, loading), largest first.
    pub positive: Vec<(usize, f64)>,
    /// (gene index, loading), most negative first.
    pub negative: Vec<(usize, f64)>,
}

impl PcaResult {
    pub fn loading(&self, gene_pos: usize, pc: usize) -> f64 {
        self.loadings[gene_pos * self.n_components + pc]
    }

    pub fn score(&self, cell: usize, pc: usize) -> f64 {
        self.scores[cell * self.n_components + pc]
    }

    /// Leading `dims` scores per cell, flattened row-major.
    pub fn leading_scores(&self, dims: usize) -> Vec<f64> {
        let dims = dims.min(self.n_components);
        let mut out = Vec::with_capacity(self.n_cells * dims);
        for cell in 0..self.n_cells {
            let row = &self.scores[cell * self.n_components..(cell + 1) * self.n_components];
            out.extend_from_slice(&row[..dims]);
        }
        out
    }

    pub fn elbow(&self) -> Vec<ElbowPoint> {
        (0..self.n_components)
            .map(|pc| ElbowPoint {
                component: pc + 1,
                stdev: self.stdev[pc],
                variance_ratio: self.variance_ratio[pc],
            })
            .collect()
    }

    /// Genes with the most extreme loadings on component `pc` (zero-based).
    pub fn top_loadings(&self, pc: usize, n: usize) -> ComponentLoadings {
        let mut order: Vec<usize> = (0..self.genes.len()).collect();
        order.sort_by(|&a, &b| {
            self.loading(b, pc)
                .total_cmp(&self.loading(a, pc))
                .then(a.cmp(&b))
        });
        let positive = order
            .iter()
            .take(n)
            .filter(|&&g| self.loading(g, pc) > 0.0)
            .map(|&g| (self.genes[g], self.loading(g, pc)))
            .collect();
        let negative = order
            .iter()
            .rev()
            .take(n)
            .filter(|&&g| self.loading(g, pc) < 0.0)
            .map(|&g| (self.genes[g], self.loading(g, pc)))
            .collect();
        ComponentLoadings {
            component: pc + 1,
            positive,
            negative,
        }
    }
}

/// Pruned shared-nearest-neighbour graph in CSR form, symmetric, no self loops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnnGraph {
    pub n_nodes: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<u32>,
    pub weights: Vec<f64>,
}

impl SnnGraph {
    pub fn n_edges(&self) -> usize {
        self.col_idx.len() / 2
    }

    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[node]..self.row_ptr[node + 1];
        self.col_idx[range.clone()]
            .iter()
            .map(|&c| c as usize)
            .zip(self.weights[range].iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborGraph {
    pub dims: usize,
    pub k: usize,
    pub prune: f64,
    /// `k` neighbour indices per cell, nearest first, the cell itself included.
    pub knn: Vec<u32>,
    pub snn: SnnGraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringInfo {
    pub resolution: f64,
    pub n_clusters: usize,
    pub modularity: f64,
    /// Cells per label, label 0 first.
    pub sizes: Vec<usize>,
    pub n_starts: usize,
    pub n_iterations: usize,
}

pub type Clusterings = BTreeMap<String, ClusteringInfo>;

pub fn clustering_key(resolution: f64) -> String {
    format!("snn_res.{}", resolution)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmapInfo {
    pub dims: usize,
    pub n_neighbors: usize,
    pub metric: Metric,
    pub min_dist: f64,
    pub spread: f64,
    pub a: f64,
    pub b: f64,
    pub n_epochs: usize,
    pub seed: u64,
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/reductions.rs"]
mod tests;
