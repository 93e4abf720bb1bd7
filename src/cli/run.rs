use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::model::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::report::write_reports;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input 10x directory
    #[arg(long)]
    pub(crate) input: PathBuf,

    /// Snapshot file to write (`.gz` suffix compresses)
    #[arg(long)]
    pub(crate) out: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Replace an existing snapshot
    #[arg(long)]
    pub(crate) force: bool,

    /// Directory for summary.json and TSV reports
    #[arg(long)]
    pub(crate) report_dir: Option<PathBuf>,

    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Clustering resolution; repeat for several
    #[arg(long = "resolution")]
    pub(crate) resolutions: Vec<f64>,

    /// Principal components used for the neighbour graph
    #[arg(long)]
    pub(crate) neighbor_dims: Option<usize>,

    /// Principal components used for UMAP
    #[arg(long)]
    pub(crate) umap_dims: Option<usize>,
}

impl RunArgs {
    /// Defaults, then the config file, then command-line overrides.
    pub(crate) fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut cfg = super::load_config(self.config.as_deref())?;
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if !self.resolutions.is_empty() {
            cfg.cluster.resolutions = self.resolutions.clone();
        }
        if let Some(dims) = self.neighbor_dims {
            cfg.neighbors.dims = dims;
        }
        if let Some(dims) = self.umap_dims {
            cfg.umap.dims = dims;
        }
        if self.force {
            cfg.persist.overwrite = true;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

pub fn handle(args: RunArgs) -> anyhow::Result<()> {
    let cfg = args.resolve()?;
    if args.out.exists() && !cfg.persist.overwrite {
        anyhow::bail!(
            "snapshot {} already exists; pass --force to replace it",
            args.out.display()
        );
    }
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let top_loadings = cfg.pca.report_loadings;
    let pipeline = Pipeline::new(cfg)?.persist_to(args.out.clone());
    let ds = pipeline.run_dir(&args.input)?;

    for (key, info) in &ds.clusterings {
        info!(
            clustering = key.as_str(),
            n_clusters = info.n_clusters,
            modularity = info.modularity,
            "clustering summary"
        );
    }

    if let Some(dir) = &args.report_dir {
        let written = write_reports(dir, &ds, top_loadings)?;
        info!(dir = %dir.display(), files = written.len(), "reports written");
    }
    Ok(())
}
