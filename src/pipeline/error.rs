use std::path::PathBuf;

use thiserror::Error;

use crate::input::InputError;
use crate::pipeline::StageId;
use crate::store::snapshot::SnapshotError;

/// Failure class of a pipeline error, independent of the stage that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    EmptyResult,
    Parameter,
    PersistenceConflict,
    Io,
    Numeric,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{stage}] format error: {source}")]
    Format {
        stage: StageId,
        #[source]
        source: InputError,
    },
    #[error("[{stage}] empty result: {what}")]
    EmptyResult { stage: StageId, what: String },
    #[error("[{stage}] invalid parameter `{name}`: {reason}")]
    Parameter {
        stage: StageId,
        name: String,
        reason: String,
    },
    #[error("[{stage}] refusing to overwrite existing file {}", path.display())]
    PersistenceConflict { stage: StageId, path: PathBuf },
    #[error("[{stage}] io error: {source}")]
    Io {
        stage: StageId,
        #[source]
        source: std::io::Error,
    },
    #[error("[{stage}] numeric failure: {reason}")]
    Numeric { stage: StageId, reason: String },
    #[error("[{stage}] snapshot error: {source}")]
    Snapshot {
        stage: StageId,
        #[source]
        source: SnapshotError,
    },
}

impl PipelineError {
    pub fn format(stage: StageId, source: InputError) -> Self {
        PipelineError::Format { stage, source }
    }

    pub fn empty(stage: StageId, what: impl Into<String>) -> Self {
        PipelineError::EmptyResult {
            stage,
            what: what.into(),
        }
    }

    pub fn parameter(stage: StageId, name: &str, reason: impl Into<String>) -> Self {
        PipelineError::Parameter {
            stage,
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn numeric(stage: StageId, reason: impl Into<String>) -> Self {
        PipelineError::Numeric {
            stage,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Format { .. } => ErrorKind::Format,
            PipelineError::EmptyResult { .. } => ErrorKind::EmptyResult,
            PipelineError::Parameter { .. } => ErrorKind::Parameter,
            PipelineError::PersistenceConflict { .. } => ErrorKind::PersistenceConflict,
            PipelineError::Io { .. } => ErrorKind::Io,
            PipelineError::Numeric { .. } => ErrorKind::Numeric,
            PipelineError::Snapshot { source, .. } => match source {
                SnapshotError::Exists(_) => ErrorKind::PersistenceConflict,
                SnapshotError::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Format,
            },
        }
    }

    pub fn stage(&self) -> StageId {
        match self {
            PipelineError::Format { stage, .. }
            | PipelineError::EmptyResult { stage, .. }
            | PipelineError::Parameter { stage, .. }
            | PipelineError::PersistenceConflict { stage, .. }
            | PipelineError::Io { stage, .. }
            | PipelineError::Numeric { stage, .. }
            | PipelineError::Snapshot { stage, .. } => *stage,
        }
    }
}
