use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::dataset::Dataset;
use crate::model::reductions::ClusteringInfo;
use crate::model::thresholds::QcFailures;
use crate::pipeline::StageId;
use crate::report::ReportError;
use crate::simd;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tool: ToolSummary,
    pub input: InputSummary,
    pub stages: Vec<StageSummary>,
    pub qc: Option<QcSummary>,
    pub n_variable_features: Option<usize>,
    pub pca: Option<PcaSummary>,
    pub clusterings: BTreeMap<String, ClusteringInfo>,
    pub ident: Option<String>,
    pub umap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub version: String,
    pub simd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSummary {
    pub dir: String,
    pub format: String,
    pub n_genes_raw: usize,
    pub n_cells_raw: usize,
    pub nnz_raw: usize,
    pub n_duplicate_genes: usize,
}

/// Dimensions after each executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: StageId,
    pub n_cells: usize,
    pub n_genes: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcSummary {
    pub n_before: usize,
    pub n_after: usize,
    pub failures: QcFailures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaSummary {
    pub n_components: usize,
    pub n_genes: usize,
    pub total_variance: f64,
    pub variance_ratio: Vec<f64>,
    pub cumulative_ratio: f64,
}

pub fn build_summary(ds: &Dataset) -> RunSummary {
    RunSummary {
        tool: ToolSummary {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            simd: simd::backend_name().to_string(),
        },
        input: InputSummary {
            dir: ds.source.input_dir.clone(),
            format: ds.source.format.clone(),
            n_genes_raw: ds.source.n_genes_raw,
            n_cells_raw: ds.source.n_cells_raw,
            nnz_raw: ds.source.nnz_raw,
            n_duplicate_genes: ds.source.duplicate_genes.len(),
        },
        stages: ds
            .history
            .iter()
            .map(|r| StageSummary {
                stage: r.stage,
                n_cells: r.n_cells,
                n_genes: r.n_genes,
                elapsed_ms: r.elapsed_ms,
            })
            .collect(),
        qc: ds.qc.as_ref().map(|qc| QcSummary {
            n_before: qc.n_before,
            n_after: qc.n_after,
            failures: qc.failures,
        }),
        n_variable_features: ds.genes.variable_genes().map(<[usize]>::len),
        pca: ds.pca.as_ref().map(|p| PcaSummary {
            n_components: p.n_components,
            n_genes: p.genes.len(),
            total_variance: p.total_variance,
            variance_ratio: p.variance_ratio.clone(),
            cumulative_ratio: p.variance_ratio.iter().sum(),
        }),
        clusterings: ds.clusterings.clone(),
        ident: ds.cells.ident.clone(),
        umap: ds.cells.umap.is_some(),
    }
}

pub fn write_summary(out_dir: &Path, summary: &RunSummary) -> Result<PathBuf, ReportError> {
    let json = serde_json::to_string_pretty(summary)?;
    let path = out_dir.join("summary.json");
    std::fs::write(&path, json)?;
    Ok(path)
}
