use super::*;
use crate::model::config::LoadConfig;
use crate::pipeline::ErrorKind;
use crate::pipeline::fixtures::synthetic_dir;
use crate::pipeline::stage1_load::run_stage1;

fn loaded() -> Dataset {
    let (dir, _) = synthetic_dir(3);
    run_stage1(
        dir.path(),
        &LoadConfig {
            min_cells: 3,
            min_features: 100,
        },
    )
    .expect("load")
}

#[test]
fn values_follow_log1p_of_scaled_counts() {
    let mut ds = loaded();
    NormalizeStage::new(NormalizeConfig::default())
        .apply(&mut ds)
        .expect("normalize");

    let data = ds.data.as_ref().expect("data");
    assert_eq!(data.nnz(), ds.counts.nnz());
    assert_eq!(ds.scale_factor, Some(10_000.0));
    let libsize = ds.cells.n_count[0] as f64;
    for ((_, count), (_, value)) in ds.counts.iter_cell(0).zip(data.iter_cell(0)) {
        let expected = (count as f64 / libsize * 10_000.0).ln_1p();
        assert!((value as f64 - expected).abs() < 1e-5);
    }
}

#[test]
fn normalizing_twice_is_rejected() {
    let mut ds = loaded();
    let stage = NormalizeStage::new(NormalizeConfig::default());
    stage.apply(&mut ds).expect("normalize");
    let before = ds.clone();

    let err = stage.apply(&mut ds).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert_eq!(ds, before);
}

#[test]
fn non_positive_scale_factor_is_rejected() {
    let mut ds = loaded();
    let err = NormalizeStage::new(NormalizeConfig { scale_factor: 0.0 })
        .apply(&mut ds)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parameter);
    assert!(ds.data.is_none());
}
