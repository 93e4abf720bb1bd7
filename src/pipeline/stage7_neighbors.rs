use tracing::{info, warn};

use crate::graph::knn::{Metric, exact_knn};
use crate::graph::snn::build_snn;
use crate::model::config::NeighborsConfig;
use crate::model::dataset::Dataset;
use crate::model::reductions::NeighborGraph;
use crate::pipeline::{PipelineError, Stage, StageId};

/// Exact Euclidean kNN in the leading `dims` components, then the pruned
/// shared-nearest-neighbour graph over it.
pub struct NeighborsStage {
    cfg: NeighborsConfig,
}

impl NeighborsStage {
    pub fn new(cfg: NeighborsConfig) -> Self {
        Self { cfg }
    }
}

impl Stage for NeighborsStage {
    fn id(&self) -> StageId {
        StageId::Neighbors
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.cfg).unwrap_or_default()
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        let Some(pca) = ds.pca.as_ref() else {
            return Err(PipelineError::parameter(
                StageId::Neighbors,
                "pca",
                "principal components are required before the neighbour graph",
            ));
        };
        let dims = self.cfg.dims;
        if dims == 0 || dims > pca.n_components {
            return Err(PipelineError::parameter(
                StageId::Neighbors,
                "neighbors.dims",
                format!(
                    "{} is outside the {} computed components",
                    dims, pca.n_components
                ),
            ));
        }
        let n = pca.n_cells;
        let mut k = self.cfg.k;
        if k > n {
            warn!(k, cells = n, "k exceeds cell count, clamping");
            k = n;
        }

        let points = pca.leading_scores(dims);
        let knn = exact_knn(&points, dims, k, Metric::Euclidean, true)
            .map_err(|e| PipelineError::numeric(StageId::Neighbors, e.to_string()))?;
        let snn = build_snn(&knn, self.cfg.prune);
        info!(dims, k, edges = snn.n_edges(), "neighbour graph built");

        let graph = NeighborGraph {
            dims,
            k,
            prune: self.cfg.prune,
            knn: knn.indices,
            snn,
        };
        ds.invalidate_from(StageId::Neighbors);
        ds.neighbors = Some(graph);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage7_neighbors.rs"]
mod tests;
