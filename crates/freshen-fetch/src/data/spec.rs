use chrono::{DateTime, Utc};
use freshen_policy::IdempotencyPolicy;
use freshen_verify::ExpectedDigests;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What to do with a partial download when no digest is known to vouch
/// for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeFallback {
    #[default]
    Restart,
    Continue,
}

/// One remote file to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub url: String,
    /// Destination file, or an existing directory to place the URL's file name in.
    pub dst: PathBuf,
    #[serde(default)]
    pub policy: IdempotencyPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "ExpectedDigests::is_empty")]
    pub digests: ExpectedDigests,
    #[serde(default)]
    pub if_no_digest: ResumeFallback,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl FetchSpec {
    pub fn new(url: impl Into<String>, dst: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dst: dst.into(),
            policy: IdempotencyPolicy::default(),
            size: None,
            mtime: None,
            digests: ExpectedDigests::new(),
            if_no_digest: ResumeFallback::default(),
            headers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: IdempotencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn mtime(mut self, mtime: DateTime<Utc>) -> Self {
        self.mtime = Some(mtime);
        self
    }

    #[must_use]
    pub fn digest(mut self, algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        self.digests.insert(algorithm, hex);
        self
    }

    #[must_use]
    pub fn if_no_digest(mut self, fallback: ResumeFallback) -> Self {
        self.if_no_digest = fallback;
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
