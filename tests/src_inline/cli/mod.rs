use super::*;
use crate::pipeline::StageId;
use crate::pipeline::fixtures::{prepared, small_config, synthetic_dir};
use crate::store::snapshot::{read_snapshot, write_snapshot};
use clap::Parser;
use tempfile::tempdir;

fn run_args(extra: &[&str]) -> run::RunArgs {
    let mut argv = vec!["kira-scflow", "run", "--input", "in", "--out", "out.kscf"];
    argv.extend_from_slice(extra);
    match Cli::parse_from(argv).command {
        Command::Run(args) => args,
        _ => panic!("expected run command"),
    }
}

#[test]
fn run_overrides_apply_over_defaults() {
    let args = run_args(&[
        "--seed",
        "7",
        "--resolution",
        "0.4",
        "--resolution",
        "1.2",
        "--neighbor-dims",
        "12",
        "--umap-dims",
        "15",
        "--force",
    ]);
    let cfg = args.resolve().expect("resolve");
    assert_eq!(cfg.seed, 7);
    assert_eq!(cfg.cluster.resolutions, vec![0.4, 1.2]);
    assert_eq!(cfg.neighbors.dims, 12);
    assert_eq!(cfg.umap.dims, 15);
    assert!(cfg.persist.overwrite);
}

#[test]
fn run_without_overrides_keeps_defaults() {
    let cfg = run_args(&[]).resolve().expect("resolve");
    assert_eq!(cfg, PipelineConfig::default());
}

#[test]
fn command_line_beats_config_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cfg.toml");
    std::fs::write(&path, "seed = 3\n[neighbors]\ndims = 8\n").expect("write");
    let path_str = path.to_string_lossy().to_string();

    let cfg = run_args(&["--config", &path_str, "--neighbor-dims", "9"])
        .resolve()
        .expect("resolve");
    assert_eq!(cfg.seed, 3);
    assert_eq!(cfg.neighbors.dims, 9);
}

#[test]
fn invalid_override_is_rejected() {
    let err = run_args(&["--neighbor-dims", "80"]).resolve().unwrap_err();
    assert!(err.to_string().contains("neighbors.dims"));
}

#[test]
fn missing_config_file_names_the_path() {
    let err = load_config(Some(Path::new("/nonexistent/cfg.toml"))).unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/cfg.toml"));
}

#[test]
fn subcommands_parse() {
    let cli = Cli::parse_from(["kira-scflow", "inspect", "--snapshot", "a.kscf"]);
    assert!(matches!(cli.command, Command::Inspect(_)));
    let cli = Cli::parse_from(["kira-scflow", "config"]);
    assert!(matches!(cli.command, Command::Config(ref a) if a.config.is_none()));
    let cli = Cli::parse_from(["kira-scflow", "validate", "--input", "in"]);
    assert!(matches!(cli.command, Command::Validate(ref a) if a.out.is_none()));
}

#[test]
fn run_writes_snapshot_and_reports() {
    let (input, _) = synthetic_dir(71);
    let work = tempdir().expect("tempdir");
    let cfg_path = work.path().join("cfg.toml");
    std::fs::write(&cfg_path, small_config().to_toml_string().expect("toml")).expect("write");
    let out = work.path().join("snap").join("run.kscf");
    let reports = work.path().join("reports");

    let args = run::RunArgs {
        input: input.path().to_path_buf(),
        out: out.clone(),
        config: Some(cfg_path),
        force: false,
        report_dir: Some(reports.clone()),
        seed: None,
        resolutions: vec![0.5, 1.0],
        neighbor_dims: None,
        umap_dims: None,
    };
    run::handle(args).expect("run");

    let (_, ds) = read_snapshot(&out).expect("snapshot");
    assert_eq!(ds.clusterings.len(), 2);
    assert_eq!(ds.cells.ident.as_deref(), Some("snn_res.1"));
    assert!(reports.join("summary.json").exists());
    assert!(reports.join("cells.tsv").exists());
}

#[test]
fn run_refuses_existing_snapshot_without_force() {
    let work = tempdir().expect("tempdir");
    let out = work.path().join("run.kscf");
    std::fs::write(&out, b"existing").expect("write");
    let args = run::RunArgs {
        input: work.path().join("missing"),
        out: out.clone(),
        config: None,
        force: false,
        report_dir: None,
        seed: None,
        resolutions: Vec::new(),
        neighbor_dims: None,
        umap_dims: None,
    };
    let err = run::handle(args).unwrap_err();
    assert!(err.to_string().contains("--force"));
    assert_eq!(std::fs::read(&out).expect("read"), b"existing");
}

#[test]
fn validate_lines_report_raw_and_filtered_dims() {
    let ds = prepared(73, StageId::Load);
    let lines = validate::validate_lines(&ds);
    let get = |key: &str| {
        lines
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .expect("key")
    };
    assert_eq!(get("n_cells"), ds.n_cells().to_string());
    assert_eq!(get("n_cells_raw"), ds.source.n_cells_raw.to_string());
    assert_eq!(get("duplicate_genes"), "1");
}

#[test]
fn inspect_describes_clusterings() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("run.kscf");
    let ds = prepared(73, StageId::Cluster);
    write_snapshot(&path, &ds, false).expect("write");

    let (header, restored) = read_snapshot(&path).expect("read");
    let text = inspect::describe(&header, &restored);
    assert!(text.contains(&format!("n_cells\t{}\n", ds.n_cells())));
    assert!(text.contains("snn_res.0.5\t3 clusters\t30,30,30\n"));
    assert!(text.contains("ident\tsnn_res.0.5\n"));
    assert!(text.contains("gzip\tfalse\n"));
}
