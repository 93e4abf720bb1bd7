use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;

use crate::model::dataset::Dataset;
use crate::store::snapshot::{SnapshotHeader, read_snapshot};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot written by `run`
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
}

pub fn handle(args: InspectArgs) -> anyhow::Result<()> {
    let (header, ds) = read_snapshot(&args.snapshot)?;
    print!("{}", describe(&header, &ds));
    Ok(())
}

pub(crate) fn describe(header: &SnapshotHeader, ds: &Dataset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "version\t{}", header.version);
    let _ = writeln!(out, "gzip\t{}", header.is_gzip());
    let _ = writeln!(out, "payload_bytes\t{}", header.payload_len);
    let _ = writeln!(out, "input\t{}", ds.source.input_dir);
    let _ = writeln!(out, "n_cells\t{}", ds.n_cells());
    let _ = writeln!(out, "n_genes\t{}", ds.n_genes());
    if let Some(hvg) = ds.genes.variable_genes() {
        let _ = writeln!(out, "variable_features\t{}", hvg.len());
    }
    if let Some(pca) = &ds.pca {
        let _ = writeln!(out, "pca_components\t{}", pca.n_components);
    }
    for (key, info) in &ds.clusterings {
        let sizes: Vec<String> = info.sizes.iter().map(|s| s.to_string()).collect();
        let _ = writeln!(
            out,
            "{}\t{} clusters\t{}",
            key,
            info.n_clusters,
            sizes.join(",")
        );
    }
    if let Some(ident) = &ds.cells.ident {
        let _ = writeln!(out, "ident\t{}", ident);
    }
    let stages: Vec<&str> = ds.history.iter().map(|r| r.stage.as_str()).collect();
    let _ = writeln!(out, "stages\t{}", stages.join(","));
    out
}
