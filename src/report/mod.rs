pub mod json;
pub mod tsv;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::dataset::Dataset;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `summary.json` and every table the dataset has results for.
/// Returns the written paths in order.
pub fn write_reports(
    out_dir: &Path,
    ds: &Dataset,
    top_loadings: usize,
) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();

    let summary = json::build_summary(ds);
    written.push(json::write_summary(out_dir, &summary)?);

    if let Some(qc) = &ds.qc {
        let path = out_dir.join("qc.tsv");
        tsv::write_qc(&path, qc)?;
        written.push(path);
    }
    if ds.genes.hvg.is_some() {
        let path = out_dir.join("variable_features.tsv");
        tsv::write_variable_features(&path, ds)?;
        written.push(path);
    }
    if let Some(pca) = &ds.pca {
        let path = out_dir.join("elbow.tsv");
        tsv::write_elbow(&path, pca)?;
        written.push(path);

        let path = out_dir.join("loadings_top.tsv");
        tsv::write_loadings_top(&path, ds, pca, top_loadings)?;
        written.push(path);
    }
    let path = out_dir.join("cells.tsv");
    tsv::write_cells(&path, ds)?;
    written.push(path);

    Ok(written)
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
