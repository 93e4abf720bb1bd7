use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::model::config::PipelineConfig;

mod config;
mod inspect;
mod run;
mod validate;

#[derive(Parser, Debug)]
#[command(
    name = "kira-scflow",
    version,
    about = "Single-cell clustering pipeline: QC, normalization, PCA, SNN/Louvain, UMAP"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write a snapshot
    Run(run::RunArgs),
    /// Ingest a 10x directory and report its dimensions
    Validate(validate::ValidateArgs),
    /// Print the resolved configuration as TOML
    Config(config::ConfigArgs),
    /// Verify and summarise a snapshot
    Inspect(inspect::InspectArgs),
}

impl Cli {
    pub fn dispatch(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run(args) => run::handle(args),
            Command::Validate(args) => validate::handle(args),
            Command::Config(args) => config::handle(args),
            Command::Inspect(args) => inspect::handle(args),
        }
    }
}

/// Defaults, overlaid by the TOML file when one is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/cli/mod.rs"]
mod tests;
