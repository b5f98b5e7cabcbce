use freshen_verify::VerifyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Classification of every failure that can end an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `error` policy and a destination already exists.
    PreconditionFailed,
    /// Another process holds a lock we need.
    LockUnavailable,
    ChecksumMismatch,
    /// Retryable network failure.
    TransientTransport,
    /// Bad locator or request; never retried.
    MalformedRequest,
    TransformFailure,
    Io,
    /// Panics, crashed workers and other failures outside the taxonomy.
    Internal,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::PreconditionFailed => "PreconditionFailed",
            Self::LockUnavailable => "LockUnavailable",
            Self::ChecksumMismatch => "ChecksumMismatch",
            Self::TransientTransport => "TransientTransport",
            Self::MalformedRequest => "MalformedRequest",
            Self::TransformFailure => "TransformFailure",
            Self::Io => "Io",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a crate error onto [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for freshen_fs::Error {
    fn kind(&self) -> ErrorKind {
        match self {
            freshen_fs::Error::LockUnavailable { .. } => ErrorKind::LockUnavailable,
            freshen_fs::Error::InvalidPath { .. } => ErrorKind::MalformedRequest,
            _ => ErrorKind::Io,
        }
    }
}

impl Classify for VerifyError {
    fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::Mismatch { .. } => ErrorKind::ChecksumMismatch,
            VerifyError::UnsupportedAlgorithm(_) => ErrorKind::MalformedRequest,
            VerifyError::Read { .. } | VerifyError::Io(_) => ErrorKind::Io,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("'{path}' already exists")]
    AlreadyExists { path: PathBuf },

    #[error("failed to stat '{path}': {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl Classify for PolicyError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists { .. } => ErrorKind::PreconditionFailed,
            Self::Stat { .. } => ErrorKind::Io,
            Self::Verify(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
