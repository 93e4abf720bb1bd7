use tracing::info;

use crate::graph::louvain::{LouvainParams, louvain};
use crate::model::config::ClusterConfig;
use crate::model::dataset::Dataset;
use crate::model::reductions::{ClusteringInfo, clustering_key};
use crate::pipeline::{PipelineError, Stage, StageId};

/// Louvain clustering of the SNN graph at every configured resolution. Each
/// resolution is stored under its own key; the last one becomes the active identity.
pub struct ClusterStage {
    cfg: ClusterConfig,
    seed: u64,
}

impl ClusterStage {
    pub fn new(cfg: ClusterConfig, seed: u64) -> Self {
        Self { cfg, seed }
    }
}

impl Stage for ClusterStage {
    fn id(&self) -> StageId {
        StageId::Cluster
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "resolutions": self.cfg.resolutions,
            "n_starts": self.cfg.n_starts,
            "n_iterations": self.cfg.n_iterations,
            "min_clusters": self.cfg.min_clusters,
            "group_singletons": self.cfg.group_singletons,
            "seed": self.seed,
        })
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let Some(graph) = ds.neighbors.as_ref() else {
            return Err(PipelineError::parameter(
                StageId::Cluster,
                "neighbors",
                "the neighbour graph is required before clustering",
            ));
        };
        if self.cfg.resolutions.is_empty() {
            return Err(PipelineError::parameter(
                StageId::Cluster,
                "cluster.resolutions",
                "at least one resolution is required",
            ));
        }

        let mut results = Vec::with_capacity(self.cfg.resolutions.len());
        for &resolution in &self.cfg.resolutions {
            if !(resolution.is_finite() && resolution > 0.0) {
                return Err(PipelineError::parameter(
                    StageId::Cluster,
                    "cluster.resolutions",
                    format!("resolution {} must be a positive number", resolution),
                ));
            }
            let partition = louvain(
                &graph.snn,
                &LouvainParams {
                    resolution,
                    n_starts: self.cfg.n_starts,
                    n_iterations: self.cfg.n_iterations,
                    seed: self.seed,
                    group_singletons: self.cfg.group_singletons,
                },
            );
            if partition.n_clusters < self.cfg.min_clusters {
                return Err(PipelineError::parameter(
                    StageId::Cluster,
                    "cluster.resolutions",
                    format!(
                        "resolution {} produced {} cluster(s), fewer than the required {}",
                        resolution, partition.n_clusters, self.cfg.min_clusters
                    ),
                ));
            }
            let sizes = partition.sizes();
            info!(
                resolution,
                clusters = partition.n_clusters,
                modularity = partition.modularity,
                sizes = ?sizes,
                "clustering"
            );
            let info = ClusteringInfo {
                resolution,
                n_clusters: partition.n_clusters,
                modularity: partition.modularity,
                sizes,
                n_starts: self.cfg.n_starts,
                n_iterations: self.cfg.n_iterations,
            };
            results.push((clustering_key(resolution), partition.labels, info));
        }

        for (key, labels, info) in results {
            ds.cells.clusters.insert(key.clone(), labels);
            ds.clusterings.insert(key.clone(), info);
            ds.cells.ident = Some(key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage8_cluster.rs"]
mod tests;
