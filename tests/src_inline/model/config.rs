use super::*;
use crate::model::thresholds::Cmp;

#[test]
fn defaults_validate() {
    let cfg = PipelineConfig::default();
    cfg.validate().expect("defaults are valid");
    assert_eq!(cfg.seed, 42);
    assert_eq!(cfg.neighbors.dims, 4);
    assert_eq!(cfg.umap.dims, 20);
    assert_eq!(cfg.hvg.n_features, 2000);
    assert_eq!(cfg.scale.clip_bound(), Some(10.0));
    assert!(!cfg.persist.overwrite);
}

#[test]
fn partial_toml_keeps_other_defaults() {
    let cfg = PipelineConfig::from_toml_str(
        r#"
seed = 7

[cluster]
resolutions = [0.4, 0.8]

[[qc.n_count]]
op = "gt"
value = 500.0
"#,
    )
    .expect("parse");
    assert_eq!(cfg.seed, 7);
    assert_eq!(cfg.cluster.resolutions, vec![0.4, 0.8]);
    assert_eq!(cfg.cluster.n_starts, 10);
    assert_eq!(cfg.qc.n_count, vec![Bound::new(Cmp::Gt, 500.0)]);
    assert_eq!(cfg.qc.mito_pattern, "^MT-");
    assert_eq!(cfg.pca, PcaConfig::default());
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(matches!(
        PipelineConfig::from_toml_str("[pca]\ncomponents = 5\n"),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn toml_round_trip() {
    let mut cfg = PipelineConfig::default();
    cfg.umap.n_epochs = Some(100);
    cfg.scale.clip = f64::INFINITY;
    let text = cfg.to_toml_string().expect("encode");
    let back = PipelineConfig::from_toml_str(&text).expect("parse");
    assert_eq!(back, cfg);
    assert_eq!(back.scale.clip_bound(), None);
}

fn rejected(cfg: PipelineConfig, field: &str) {
    match cfg.validate() {
        Err(ConfigError::Parameter { name, .. }) => assert_eq!(name, field),
        other => panic!("expected {} to be rejected, got {:?}", field, other),
    }
}

#[test]
fn validation_names_the_offending_field() {
    let mut cfg = PipelineConfig::default();
    cfg.neighbors.dims = 60;
    rejected(cfg, "neighbors.dims");

    let mut cfg = PipelineConfig::default();
    cfg.normalize.scale_factor = 0.0;
    rejected(cfg, "normalize.scale_factor");

    let mut cfg = PipelineConfig::default();
    cfg.hvg.span = 1.5;
    rejected(cfg, "hvg.span");

    let mut cfg = PipelineConfig::default();
    cfg.cluster.resolutions.clear();
    rejected(cfg, "cluster.resolutions");

    let mut cfg = PipelineConfig::default();
    cfg.umap.min_dist = 2.0;
    rejected(cfg, "umap.min_dist");

    let mut cfg = PipelineConfig::default();
    cfg.qc.mito_pattern = "(".to_string();
    rejected(cfg, "qc.mito_pattern");

    let mut cfg = PipelineConfig::default();
    cfg.qc.percent_mt = vec![Bound::new(Cmp::Lt, f64::NAN)];
    rejected(cfg, "qc.percent_mt");
}

#[test]
fn reads_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("scflow.toml");
    std::fs::write(&path, "[neighbors]\ndims = 10\n").expect("write");
    let cfg = PipelineConfig::from_file(&path).expect("read");
    assert_eq!(cfg.neighbors.dims, 10);
    assert!(matches!(
        PipelineConfig::from_file(&dir.path().join("missing.toml")),
        Err(ConfigError::Io(_))
    ));
}
