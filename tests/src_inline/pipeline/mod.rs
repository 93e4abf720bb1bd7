use super::*;
use std::fs;

use crate::pipeline::fixtures::{
    CELLS_PER_TYPE, N_TYPES, small_config, synthetic, synthetic_dir, write_10x,
};
use crate::store::snapshot::read_snapshot;
use tempfile::tempdir;

#[test]
fn stage_names_follow_pipeline_order() {
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let ids = pipeline.stage_ids();
    assert_eq!(ids.first(), Some(&StageId::Qc));
    assert_eq!(ids.last(), Some(&StageId::Umap));
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(StageId::Persist.as_str(), "stage10_persist");
    assert_eq!(StageId::Load.to_string(), "stage1_load");
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let mut cfg = small_config();
    cfg.neighbors.dims = 60;
    assert!(Pipeline::new(cfg).is_err());
}

#[test]
fn full_run_fills_every_result() {
    let (dir, _) = synthetic_dir(31);
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let ds = pipeline.run_dir(dir.path()).expect("run");

    assert_eq!(ds.n_cells(), N_TYPES * CELLS_PER_TYPE);
    assert!(ds.is_normalized());
    assert!(ds.genes.hvg.is_some());
    assert!(ds.scaled.is_some());
    assert!(ds.pca.is_some());
    assert!(ds.neighbors.is_some());
    assert_eq!(ds.cells.ident.as_deref(), Some("snn_res.0.5"));
    assert_eq!(ds.cells.umap.as_ref().map(Vec::len), Some(ds.n_cells()));

    let stages: Vec<StageId> = ds.history.iter().map(|r| r.stage).collect();
    assert_eq!(stages.len(), 9);
    assert_eq!(stages[0], StageId::Load);
    assert_eq!(stages[8], StageId::Umap);
    assert_eq!(ds.history[1].n_cells, ds.n_cells());
}

#[test]
fn identical_inputs_and_seed_give_identical_results() {
    let (dir, _) = synthetic_dir(37);
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let mut a = pipeline.run_dir(dir.path()).expect("run");
    let mut b = pipeline.run_dir(dir.path()).expect("run");
    // timings are the only run-dependent field
    for r in a.history.iter_mut().chain(b.history.iter_mut()) {
        r.elapsed_ms = 0;
    }
    assert_eq!(a, b);
}

#[test]
fn qc_keeps_cells_and_table_aligned() {
    let (dir, _) = synthetic_dir(41);
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let ds = pipeline.run_dir(dir.path()).expect("run");
    assert_eq!(ds.cells.len(), ds.n_cells());
    assert_eq!(ds.cells.n_count.len(), ds.n_cells());
    let report = ds.qc.as_ref().expect("qc");
    let passed: Vec<&str> = report
        .rows
        .iter()
        .filter(|r| r.pass)
        .map(|r| r.barcode.as_str())
        .collect();
    let kept: Vec<&str> = ds.cells.barcodes.iter().map(String::as_str).collect();
    assert_eq!(passed, kept);
}

#[test]
fn barcode_mismatch_fails_at_load() {
    let dir = tempdir().expect("tempdir");
    let data = synthetic(43);
    write_10x(dir.path(), &data);
    // one barcode short of the matrix column count
    let short: String = data.barcodes[1..].iter().map(|b| format!("{}\n", b)).collect();
    fs::write(dir.path().join("barcodes.tsv"), short).expect("write barcodes");

    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let err = pipeline.run_dir(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(err.stage(), StageId::Load);
}

#[test]
fn persisted_run_refuses_to_overwrite() {
    let (dir, _) = synthetic_dir(47);
    let out = tempdir().expect("tempdir");
    let path = out.path().join("run.kscf.gz");

    let pipeline = Pipeline::new(small_config())
        .expect("pipeline")
        .persist_to(path.clone());
    let ds = pipeline.run_dir(dir.path()).expect("first run");
    let (header, restored) = read_snapshot(&path).expect("read");
    assert!(header.is_gzip());
    assert_eq!(restored.cells, ds.cells);

    let before = fs::read(&path).expect("read");
    let err = pipeline.run_dir(dir.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceConflict);
    assert_eq!(err.stage(), StageId::Persist);
    assert_eq!(fs::read(&path).expect("read"), before);
}

#[test]
fn failed_stage_leaves_dataset_unchanged() {
    let (dir, _) = synthetic_dir(53);
    let pipeline = Pipeline::new(small_config()).expect("pipeline");
    let mut ds = pipeline.run_dir(dir.path()).expect("run");
    let before = ds.clone();

    let stage = stage3_normalize::NormalizeStage::new(Default::default());
    let err = run_stage(&stage, &mut ds).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(ds, before);
}
