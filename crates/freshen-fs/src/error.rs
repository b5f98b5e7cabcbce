use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{path}' is locked by another process")]
    LockUnavailable { path: PathBuf },

    #[error("failed to lock '{path}': {source}")]
    Lock { path: PathBuf, source: io::Error },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to publish '{path}': {source}")]
    Publish { path: PathBuf, source: io::Error },

    #[error("'{path}' has no file name")]
    InvalidPath { path: PathBuf },
}

impl Error {
    /// True when the failure is lock contention rather than an I/O fault.
    pub fn is_lock_unavailable(&self) -> bool {
        matches!(self, Self::LockUnavailable { .. })
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::LockUnavailable { path }
            | Self::Lock { path, .. }
            | Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Publish { path, .. }
            | Self::InvalidPath { path } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
