pub mod error;
pub mod stage10_persist;
pub mod stage1_load;
pub mod stage2_qc;
pub mod stage3_normalize;
pub mod stage4_hvg;
pub mod stage5_scale;
pub mod stage6_pca;
pub mod stage7_neighbors;
pub mod stage8_cluster;
pub mod stage9_umap;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::config::{ConfigError, PipelineConfig};
use crate::model::dataset::{Dataset, StepRecord};

pub use error::{ErrorKind, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Load,
    Qc,
    Normalize,
    Hvg,
    Scale,
    Pca,
    Neighbors,
    Cluster,
    Umap,
    Persist,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Load => "stage1_load",
            StageId::Qc => "stage2_qc",
            StageId::Normalize => "stage3_normalize",
            StageId::Hvg => "stage4_hvg",
            StageId::Scale => "stage5_scale",
            StageId::Pca => "stage6_pca",
            StageId::Neighbors => "stage7_neighbors",
            StageId::Cluster => "stage8_cluster",
            StageId::Umap => "stage9_umap",
            StageId::Persist => "stage10_persist",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the pipeline. `apply` either commits its full result into the
/// dataset or returns an error with the dataset unchanged.
pub trait Stage {
    fn id(&self) -> StageId;
    fn params(&self) -> serde_json::Value;
    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError>;
}

pub struct Pipeline {
    config: PipelineConfig,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Validates the configuration and lays out the analysis stages after ingestion.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mito = config.mito_regex()?;
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(stage2_qc::QcStage::new(config.qc.clone(), mito)),
            Box::new(stage3_normalize::NormalizeStage::new(
                config.normalize.clone(),
            )),
            Box::new(stage4_hvg::HvgStage::new(config.hvg.clone())),
            Box::new(stage5_scale::ScaleStage::new(config.scale.clone())),
            Box::new(stage6_pca::PcaStage::new(config.pca.clone(), config.seed)),
            Box::new(stage7_neighbors::NeighborsStage::new(
                config.neighbors.clone(),
            )),
            Box::new(stage8_cluster::ClusterStage::new(
                config.cluster.clone(),
                config.seed,
            )),
            Box::new(stage9_umap::UmapStage::new(config.umap.clone(), config.seed)),
        ];
        Ok(Self { config, stages })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id()).collect()
    }

    /// Appends the snapshot writer as the final stage.
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        let persist = stage10_persist::PersistStage::new(path, self.config.persist.clone());
        self.stages.push(Box::new(persist));
        self
    }

    pub fn load(&self, input_dir: &Path) -> Result<Dataset, PipelineError> {
        let start = Instant::now();
        info!(stage = StageId::Load.as_str(), "starting stage");
        let mut ds = stage1_load::run_stage1(input_dir, &self.config.load)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            stage = StageId::Load.as_str(),
            elapsed_ms,
            cells = ds.n_cells(),
            genes = ds.n_genes(),
            nnz = ds.counts.nnz(),
            "finished stage"
        );
        ds.history.push(StepRecord {
            stage: StageId::Load,
            params: serde_json::to_value(&self.config.load).unwrap_or_default(),
            elapsed_ms,
            n_cells: ds.n_cells(),
            n_genes: ds.n_genes(),
        });
        Ok(ds)
    }

    pub fn run(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        for stage in &self.stages {
            run_stage(stage.as_ref(), ds)?;
        }
        Ok(())
    }

    pub fn run_dir(&self, input_dir: &Path) -> Result<Dataset, PipelineError> {
        let mut ds = self.load(input_dir)?;
        self.run(&mut ds)?;
        Ok(ds)
    }
}

/// Runs one stage with timing and provenance.
pub fn run_stage(stage: &dyn Stage, ds: &mut Dataset) -> Result<(), PipelineError> {
    let id = stage.id();
    let start = Instant::now();
    info!(stage = id.as_str(), "starting stage");
    stage.apply(ds)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        stage = id.as_str(),
        elapsed_ms,
        cells = ds.n_cells(),
        genes = ds.n_genes(),
        "finished stage"
    );
    ds.history.push(StepRecord {
        stage: id,
        params: stage.params(),
        elapsed_ms,
        n_cells: ds.n_cells(),
        n_genes: ds.n_genes(),
    });
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/fixtures.rs"]
pub(crate) mod fixtures;

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
