use std::path::PathBuf;

use tracing::info;

use crate::model::config::PersistConfig;
use crate::model::dataset::Dataset;
use crate::pipeline::{PipelineError, Stage, StageId};
use crate::store::snapshot::{SnapshotError, write_snapshot};

/// Writes the whole dataset to a single snapshot file.
pub struct PersistStage {
    path: PathBuf,
    cfg: PersistConfig,
}

impl PersistStage {
    pub fn new(path: PathBuf, cfg: PersistConfig) -> Self {
        Self { path, cfg }
    }
}

impl Stage for PersistStage {
    fn id(&self) -> StageId {
        StageId::Persist
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.to_string_lossy(),
            "overwrite": self.cfg.overwrite,
            "include_scaled": self.cfg.include_scaled,
        })
    }

    fn apply(&self, ds: &mut Dataset) -> Result<(), PipelineError> {
        // Left out of the file only; the in-memory dataset keeps it.
        let scaled = if self.cfg.include_scaled {
            None
        } else {
            ds.scaled.take()
        };
        let written = write_snapshot(&self.path, ds, self.cfg.overwrite);
        if scaled.is_some() {
            ds.scaled = scaled;
        }

        let header = written.map_err(|e| match e {
            SnapshotError::Exists(path) => PipelineError::PersistenceConflict {
                stage: StageId::Persist,
                path,
            },
            SnapshotError::Io(source) => PipelineError::Io {
                stage: StageId::Persist,
                source,
            },
            other => PipelineError::Snapshot {
                stage: StageId::Persist,
                source: other,
            },
        })?;
        info!(
            path = %self.path.display(),
            bytes = header.payload_len,
            gzip = header.is_gzip(),
            "snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage10_persist.rs"]
mod tests;
