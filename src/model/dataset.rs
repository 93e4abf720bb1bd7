use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::csc::{CountMatrix, NormMatrix};
use crate::expr::dense::ScaledMatrix;
use crate::input::features::DuplicateGene;
use crate::model::reductions::{Clusterings, NeighborGraph, PcaResult, UmapInfo};
use crate::model::thresholds::{QcFailures, QcThresholds};
use crate::pipeline::StageId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub input_dir: String,
    pub format: String,
    pub n_genes_raw: usize,
    pub n_cells_raw: usize,
    pub nnz_raw: usize,
    pub duplicate_genes: Vec<DuplicateGene>,
}

/// Per-cell annotations, index-aligned with the matrix cell axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellTable {
    pub barcodes: Vec<String>,
    pub n_count: Vec<u64>,
    pub n_feature: Vec<u32>,
    /// Mitochondrial fraction in [0, 1]; set by QC.
    pub percent_mt: Option<Vec<f64>>,
    /// Labels per clustering key.
    pub clusters: BTreeMap<String, Vec<u32>>,
    /// Key of the active clustering.
    pub ident: Option<String>,
    pub umap: Option<Vec<[f64; 2]>>,
}

impl CellTable {
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn subset(&self, keep: &[usize]) -> Self {
        fn pick<T: Clone>(v: &[T], keep: &[usize]) -> Vec<T> {
            keep.iter().map(|&i| v[i].clone()).collect()
        }
        Self {
            barcodes: pick(&self.barcodes, keep),
            n_count: pick(&self.n_count, keep),
            n_feature: pick(&self.n_feature, keep),
            percent_mt: self.percent_mt.as_deref().map(|v| pick(v, keep)),
            clusters: self
                .clusters
                .iter()
                .map(|(k, v)| (k.clone(), pick(v, keep)))
                .collect(),
            ident: self.ident.clone(),
            umap: self.umap.as_deref().map(|v| pick(v, keep)),
        }
    }

    pub fn active_labels(&self) -> Option<&[u32]> {
        self.ident
            .as_ref()
            .and_then(|k| self.clusters.get(k))
            .map(Vec::as_slice)
    }
}

/// Variance-stabilizing statistics, one entry per gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvgStats {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub variance_expected: Vec<f64>,
    pub variance_standardized: Vec<f64>,
    pub variable: Vec<bool>,
    /// 1-based rank among variable genes.
    pub rank: Vec<Option<u32>>,
    /// Variable gene indices in rank order.
    pub selected: Vec<usize>,
    pub span: f64,
}

/// Per-gene annotations, index-aligned with the matrix gene axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneTable {
    pub ids: Vec<String>,
    /// Unique along the axis.
    pub symbols: Vec<String>,
    pub feature_types: Vec<Option<String>>,
    pub n_cells: Vec<u32>,
    pub hvg: Option<HvgStats>,
}

impl GeneTable {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keeps the listed genes; derived statistics are dropped.
    pub fn subset(&self, keep: &[usize]) -> Self {
        Self {
            ids: keep.iter().map(|&i| self.ids[i].clone()).collect(),
            symbols: keep.iter().map(|&i| self.symbols[i].clone()).collect(),
            feature_types: keep
                .iter()
                .map(|&i| self.feature_types[i].clone())
                .collect(),
            n_cells: keep.iter().map(|&i| self.n_cells[i]).collect(),
            hvg: None,
        }
    }

    pub fn variable_genes(&self) -> Option<&[usize]> {
        self.hvg.as_ref().map(|h| h.selected.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRow {
    pub barcode: String,
    pub n_count: u64,
    pub n_feature: u32,
    pub percent_mt: f64,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    pub thresholds: QcThresholds,
    pub n_before: usize,
    pub n_after: usize,
    pub failures: QcFailures,
    pub rows: Vec<QcRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub stage: StageId,
    pub params: serde_json::Value,
    pub elapsed_ms: u64,
    pub n_cells: usize,
    pub n_genes: usize,
}

/// The annotated single-cell object threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub source: SourceInfo,
    pub counts: CountMatrix,
    pub data: Option<NormMatrix>,
    pub scale_factor: Option<f64>,
    pub cells: CellTable,
    pub genes: GeneTable,
    pub scaled: Option<ScaledMatrix>,
    pub pca: Option<PcaResult>,
    pub neighbors: Option<NeighborGraph>,
    pub clusterings: Clusterings,
    pub umap: Option<UmapInfo>,
    pub qc: Option<QcReport>,
    pub history: Vec<StepRecord>,
}

impl Dataset {
    pub fn n_cells(&self) -> usize {
        self.counts.n_cells
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes
    }

    pub fn is_normalized(&self) -> bool {
        self.data.is_some()
    }

    /// Drops every result that `stage` and later stages produce.
    pub fn invalidate_from(&mut self, stage: StageId) {
        if stage <= StageId::Normalize {
            self.data = None;
            self.scale_factor = None;
        }
        if stage <= StageId::Hvg {
            self.genes.hvg = None;
        }
        if stage <= StageId::Scale {
            self.scaled = None;
        }
        if stage <= StageId::Pca {
            self.pca = None;
        }
        if stage <= StageId::Neighbors {
            self.neighbors = None;
        }
        if stage <= StageId::Cluster {
            self.clusterings.clear();
            self.cells.clusters.clear();
            self.cells.ident = None;
        }
        if stage <= StageId::Umap {
            self.umap = None;
            self.cells.umap = None;
        }
    }

    /// Keeps the listed cells in order across the matrices and the cell table.
    pub fn retain_cells(&mut self, keep: &[usize]) {
        self.counts = self.counts.subset_cells(keep);
        self.data = self.data.as_ref().map(|d| d.subset_cells(keep));
        self.cells = self.cells.subset(keep);
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/dataset.rs"]
mod tests;
