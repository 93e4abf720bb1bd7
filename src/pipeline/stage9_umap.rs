use tracing::info;

use crate::embed::umap::{UmapParams, umap};
use crate::model::config::UmapConfig;
use crate::model::dataset::Dataset;
use crate::model::reductions::{PcaResult, UmapInfo};
use crate::pipeline::{PipelineError, Stage, StageId};

/// Starting layout from the first two principal components.
fn pca_init(pca: &PcaResult) -> Vec<[f64; 2]> {
    (0..pca.n_cells)
        .map(|cell| {
            let second = if pca.n_components > 1 {
                pca.score(cell, 1)
            } else {
                0.0
            };
            [pca.score(cell, 0), second]
        })
        .collect()
}

pub struct UmapStage {
    cfg: UmapConfig,
    seed: u64,
}

impl UmapStage {
    pub fn new(cfg: UmapConfig, seed: u64) -> Self {
        Self { cfg, seed }
    }
}

impl Stage for UmapStage {
    fn id(&self) -> StageId {
        StageId::Umap
    }

    fn params(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.cfg).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert("seed".to_string(), self.seed.into());
        }
        value
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let Some(pca) = ds.pca.as_ref() else {
            return Err(PipelineError::parameter(
                StageId::Umap,
                "pca",
                "principal components are required before umap",
            ));
        };
        let dims = self.cfg.dims;
        if dims == 0 || dims > pca.n_components {
            return Err(PipelineError::parameter(
                StageId::Umap,
                "umap.dims",
                format!(
                    "{} is outside the {} computed components",
                    dims, pca.n_components
                ),
            ));
        }

        let points = pca.leading_scores(dims);
        let init = pca_init(pca);
        let params = UmapParams {
            n_neighbors: self.cfg.n_neighbors,
            metric: self.cfg.metric,
            min_dist: self.cfg.min_dist,
            spread: self.cfg.spread,
            n_epochs: self.cfg.n_epochs,
            learning_rate: self.cfg.learning_rate,
            negative_sample_rate: self.cfg.negative_sample_rate,
            a: self.cfg.a,
            b: self.cfg.b,
            seed: self.seed,
        };
        let out = umap(&points, dims, &init, &params)
            .map_err(|e| PipelineError::numeric(StageId::Umap, e.to_string()))?;
        info!(
            dims,
            n_neighbors = out.n_neighbors,
            n_epochs = out.n_epochs,
            a = out.a,
            b = out.b,
            "umap embedded"
        );

        let embedding = UmapInfo {
            dims,
            n_neighbors: out.n_neighbors,
            metric: self.cfg.metric,
            min_dist: self.cfg.min_dist,
            spread: self.cfg.spread,
            a: out.a,
            b: out.b,
            n_epochs: out.n_epochs,
            seed: self.seed,
        };
        ds.invalidate_from(StageId::Umap);
        ds.cells.umap = Some(out.coords);
        ds.umap = Some(embedding);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage9_umap.rs"]
mod tests;
