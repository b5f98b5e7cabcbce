//! Error types for freshen-fetch.

use freshen_policy::{Classify, ErrorKind, PolicyError};
use freshen_verify::VerifyError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::is_retryable_status;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("redirect from {0} has no Location header")]
    MissingLocation(String),

    #[error("too many redirects starting at {0}")]
    TooManyRedirects(String),

    #[error("response from {url} ended before resume offset {offset}")]
    EndedBeforeOffset { url: String, offset: u64 },

    #[error("received {received} of {expected} bytes from {url}")]
    SizeMismatch { url: String, received: u64, expected: u64 },

    #[error("authentication failed: {0}")]
    Auth(#[source] BoxError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Fs(#[from] freshen_fs::Error),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("background task failed: {0}")]
    Join(String),
}

impl FetchError {
    /// Whether another attempt may succeed: allow-listed HTTP statuses,
    /// timeouts and bodies of the wrong length. Connection failures and bad
    /// requests are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Transport(TransportError::Timeout(_)) => true,
            Self::EndedBeforeOffset { .. } | Self::SizeMismatch { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Classify for FetchError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } | Self::MissingLocation(_) => ErrorKind::MalformedRequest,
            Self::Transport(TransportError::InvalidRequest(_)) => ErrorKind::MalformedRequest,
            Self::Status { status, .. } if (400..500).contains(status) && !is_retryable_status(*status) => {
                ErrorKind::MalformedRequest
            }
            Self::Status { .. }
            | Self::TooManyRedirects(_)
            | Self::EndedBeforeOffset { .. }
            | Self::SizeMismatch { .. }
            | Self::Auth(_)
            | Self::Transport(_) => ErrorKind::TransientTransport,
            Self::Fs(err) => err.kind(),
            Self::Policy(err) => err.kind(),
            Self::Verify(err) => err.kind(),
            Self::Io { .. } => ErrorKind::Io,
            Self::Join(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
