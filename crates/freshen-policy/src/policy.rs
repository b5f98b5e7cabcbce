use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do when a destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IdempotencyPolicy {
    /// Keep the destinations if all of them exist.
    #[serde(rename = "skip")]
    Skip,
    /// Always regenerate.
    #[serde(rename = "overwrite")]
    Overwrite,
    /// Regenerate when size or digest differ from what is expected.
    #[default]
    #[serde(rename = "different")]
    DifferentContent,
    /// Regenerate when modification times differ from what is expected.
    #[serde(rename = "refresh")]
    RefreshByTime,
    /// Fail if any destination exists.
    #[serde(rename = "error")]
    ErrorIfExists,
}

impl IdempotencyPolicy {
    pub const ALL: [IdempotencyPolicy; 5] = [
        Self::Skip,
        Self::Overwrite,
        Self::DifferentContent,
        Self::RefreshByTime,
        Self::ErrorIfExists,
    ];

    /// The policy an operation runs under: a batch-wide override wins over
    /// the operation's own default.
    pub fn effective(override_policy: Option<Self>, default: Self) -> Self {
        override_policy.unwrap_or(default)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Overwrite => "overwrite",
            Self::DifferentContent => "different",
            Self::RefreshByTime => "refresh",
            Self::ErrorIfExists => "error",
        }
    }

    /// Whether deciding needs expected size/mtime when every destination
    /// already exists. Fetches use this to avoid querying the server.
    pub fn compares_metadata(self) -> bool {
        matches!(self, Self::DifferentContent | Self::RefreshByTime)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown policy '{0}' (expected skip, overwrite, different, refresh or error)")]
pub struct ParsePolicyError(String);

impl FromStr for IdempotencyPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "s" => Ok(Self::Skip),
            "overwrite" | "o" => Ok(Self::Overwrite),
            "different" | "d" => Ok(Self::DifferentContent),
            "refresh" | "r" => Ok(Self::RefreshByTime),
            "error" | "e" => Ok(Self::ErrorIfExists),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for IdempotencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
