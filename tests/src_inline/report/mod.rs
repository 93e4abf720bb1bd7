use super::*;
use crate::pipeline::StageId;
use crate::pipeline::fixtures::prepared;
use crate::report::json::RunSummary;
use tempfile::tempdir;

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .collect()
}

#[test]
fn writes_every_table_for_a_full_run() {
    let dir = tempdir().expect("tempdir");
    let ds = prepared(61, StageId::Umap);
    let written = write_reports(dir.path(), &ds, 3).expect("reports");
    assert_eq!(
        names(&written),
        vec![
            "summary.json",
            "qc.tsv",
            "variable_features.tsv",
            "elbow.tsv",
            "loadings_top.tsv",
            "cells.tsv"
        ]
    );
    assert!(written.iter().all(|p| p.exists()));

    let text = std::fs::read_to_string(dir.path().join("summary.json")).expect("read");
    let summary: RunSummary = serde_json::from_str(&text).expect("json");
    assert_eq!(summary.stages.len(), ds.history.len());
    assert_eq!(summary.qc.map(|q| q.n_after), Some(ds.n_cells()));
    assert_eq!(summary.pca.map(|p| p.n_components), Some(10));
    assert_eq!(summary.ident.as_deref(), Some("snn_res.0.5"));
    assert!(summary.umap);
}

#[test]
fn early_datasets_only_get_what_exists() {
    let dir = tempdir().expect("tempdir");
    let ds = prepared(61, StageId::Normalize);
    let written = write_reports(dir.path(), &ds, 3).expect("reports");
    assert_eq!(names(&written), vec!["summary.json", "qc.tsv", "cells.tsv"]);
}
