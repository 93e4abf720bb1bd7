use super::*;
use crate::pipeline::ErrorKind;
use crate::pipeline::fixtures::{
    CELLS_PER_TYPE, N_HIGH_MITO, N_RARE_GENES, N_SPARSE, N_TYPES, synthetic_dir,
};
use std::fs;
use tempfile::tempdir;

fn cfg(min_cells: usize, min_features: usize) -> LoadConfig {
    LoadConfig {
        min_cells,
        min_features,
    }
}

fn write_tiny(dir: &Path, mtx: &str, features: &str, barcodes: &str) {
    fs::write(dir.join("matrix.mtx"), mtx).expect("write matrix");
    fs::write(dir.join("features.tsv"), features).expect("write features");
    fs::write(dir.join("barcodes.tsv"), barcodes).expect("write barcodes");
}

const TINY_MTX: &str = "%%MatrixMarket matrix coordinate integer general\n3 2 4\n1 1 5\n2 1 1\n1 2 2\n3 2 7\n";
const TINY_FEATURES: &str = "g1\tA\tGene Expression\ng2\tB\tGene Expression\ng3\tA\tGene Expression\n";

#[test]
fn loads_without_filters() {
    let dir = tempdir().expect("tempdir");
    write_tiny(dir.path(), TINY_MTX, TINY_FEATURES, "c1\nc2\n");

    let ds = run_stage1(dir.path(), &cfg(0, 0)).expect("load");
    assert_eq!(ds.n_genes(), 3);
    assert_eq!(ds.n_cells(), 2);
    assert_eq!(ds.cells.barcodes, vec!["c1", "c2"]);
    assert_eq!(ds.cells.n_count, vec![6, 9]);
    assert_eq!(ds.cells.n_feature, vec![2, 2]);
    assert_eq!(ds.genes.n_cells, vec![2, 1, 1]);
    assert_eq!(ds.genes.symbols, vec!["A", "B", "A.1"]);
    assert_eq!(ds.source.duplicate_genes.len(), 1);
    assert_eq!(ds.source.format, "tenx_v3");
    assert!(ds.data.is_none());
}

#[test]
fn barcode_count_mismatch_is_a_format_error() {
    let dir = tempdir().expect("tempdir");
    write_tiny(dir.path(), TINY_MTX, TINY_FEATURES, "c1\nc2\nc3\n");

    let err = run_stage1(dir.path(), &cfg(0, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(err.stage(), StageId::Load);
}

#[test]
fn feature_count_mismatch_is_a_format_error() {
    let dir = tempdir().expect("tempdir");
    write_tiny(dir.path(), TINY_MTX, "g1\tA\ng2\tB\n", "c1\nc2\n");

    let err = run_stage1(dir.path(), &cfg(0, 0)).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Format {
            source: InputError::DimensionMismatch { what: "feature", .. },
            ..
        }
    ));
}

#[test]
fn duplicate_entries_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let mtx = "%%MatrixMarket matrix coordinate integer general\n3 2 2\n1 1 5\n1 1 2\n";
    write_tiny(dir.path(), mtx, TINY_FEATURES, "c1\nc2\n");

    let err = run_stage1(dir.path(), &cfg(0, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn missing_directory_is_a_format_error() {
    let dir = tempdir().expect("tempdir");
    let err = run_stage1(&dir.path().join("absent"), &cfg(0, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn filters_cells_then_genes() {
    let (dir, data) = synthetic_dir(7);
    let ds = run_stage1(dir.path(), &cfg(3, 100)).expect("load");

    // near-empty cells go, rare genes go
    assert_eq!(ds.n_cells(), N_TYPES * CELLS_PER_TYPE + N_HIGH_MITO);
    assert_eq!(ds.n_genes(), data.n_genes() - N_RARE_GENES);
    assert_eq!(ds.source.n_cells_raw, N_TYPES * CELLS_PER_TYPE + N_HIGH_MITO + N_SPARSE);
    assert!(ds.cells.n_feature.iter().all(|&f| f >= 100));
    assert!(ds.genes.n_cells.iter().all(|&n| n >= 3));
    assert!(!ds.genes.symbols.iter().any(|s| s.starts_with("RARE")));
    assert!(ds.genes.symbols.iter().any(|s| s == "DUP.1"));
}

#[test]
fn filters_that_remove_every_cell_are_an_empty_result() {
    let (dir, _) = synthetic_dir(7);
    let err = run_stage1(dir.path(), &cfg(3, 100_000)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
}

#[test]
fn per_cell_totals_follow_the_filtered_genes() {
    let dir = tempdir().expect("tempdir");
    // g3 only in c2; min_cells 2 removes it, so c2 keeps just its g1 count
    write_tiny(dir.path(), TINY_MTX, TINY_FEATURES, "c1\nc2\n");
    let ds = run_stage1(dir.path(), &cfg(2, 0)).expect("load");
    assert_eq!(ds.genes.ids, vec!["g1"]);
    assert_eq!(ds.cells.n_count, vec![5, 2]);
}
