use freshen_policy::{Classify, ErrorKind, PolicyError};
use freshen_verify::VerifyError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("transform '{name}' failed: {source}")]
    Failed { name: String, source: BoxError },

    #[error("unknown transform '{0}'")]
    Unknown(String),

    #[error("transform '{name}' requires argument '{arg}'")]
    MissingArgument { name: String, arg: &'static str },

    #[error("transform '{name}' cannot map {srcs} source(s) onto {dsts} destination(s)")]
    Arity { name: String, srcs: usize, dsts: usize },

    #[error("transform '{0}' only runs in-process and cannot be sent to a worker")]
    NotPortable(String),
}

impl TransformError {
    pub fn failed(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl Classify for TransformError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Failed { .. } => ErrorKind::TransformFailure,
            Self::Unknown(_) | Self::MissingArgument { .. } | Self::Arity { .. } | Self::NotPortable(_) => {
                ErrorKind::MalformedRequest
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Fs(#[from] freshen_fs::Error),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl Classify for ArtifactError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Policy(err) => err.kind(),
            Self::Fs(err) => err.kind(),
            Self::Verify(err) => err.kind(),
            Self::Transform(err) => err.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtifactError>;
