use tracing::debug;

use crate::expr::normalize::log_normalize;
use crate::model::config::NormalizeConfig;
use crate::model::dataset::Dataset;
use crate::pipeline::{PipelineError, Stage, StageId};

/// Log-normalizes the counts against each cell's library size.
pub struct NormalizeStage {
    cfg: NormalizeConfig,
}

impl NormalizeStage {
    pub fn new(cfg: NormalizeConfig) -> Self {
        Self { cfg }
    }
}

impl Stage for NormalizeStage {
    fn id(&self) -> StageId {
        StageId::Normalize
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.cfg).unwrap_or_default()
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        if ds.is_normalized() {
            return Err(PipelineError::parameter(
                StageId::Normalize,
                "data",
                "already normalized; normalizing twice is not supported",
            ));
        }
        let sf = self.cfg.scale_factor;
        if !(sf.is_finite() && sf > 0.0) {
            return Err(PipelineError::parameter(
                StageId::Normalize,
                "normalize.scale_factor",
                format!("must be a positive number, got {}", sf),
            ));
        }

        let stats = ds.counts.cell_stats();
        let empty_cells = stats.iter().filter(|s| s.libsize == 0).count();
        if empty_cells > 0 {
            debug!(cells = empty_cells, "cells with zero counts stay at zero");
        }
        let data = log_normalize(&ds.counts, &stats, sf);

        ds.invalidate_from(StageId::Normalize);
        ds.data = Some(data);
        ds.scale_factor = Some(sf);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_normalize.rs"]
mod tests;
