use std::io;
use std::path::PathBuf;

use freshen_artifact::TransformError;
use freshen_fetch::TransportError;

use crate::live::BatchSummary;

#[derive(Debug, thiserror::Error)]
pub enum SchedError {
    /// `raise` mode stopped the batch at its first failure.
    #[error("batch aborted at '{path}': {message}")]
    Aborted {
        path: String,
        message: String,
        summary: Box<BatchSummary>,
    },

    #[error("failed to start worker '{program}': {source}")]
    Spawn { program: PathBuf, source: io::Error },

    #[error("cannot locate the worker executable: {0}")]
    WorkerExecutable(#[source] io::Error),

    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("progress renderer failed: {0}")]
    Renderer(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SchedError {
    pub fn summary(&self) -> Option<&BatchSummary> {
        match self {
            Self::Aborted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedError>;
