use crate::decide::Expected;
use chrono::{DateTime, Utc};
use freshen_verify::ExpectedDigests;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Description of one artifact: where it goes, what it derives from, and
/// what it is expected to look like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub dsts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub srcs: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "ExpectedDigests::is_empty")]
    pub digests: ExpectedDigests,
}

impl ArtifactSpec {
    pub fn new(dst: impl Into<PathBuf>) -> Self {
        Self {
            dsts: vec![dst.into()],
            ..Self::default()
        }
    }

    /// Several destinations produced together.
    pub fn group<I, P>(dsts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dsts: dsts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn src(mut self, src: impl Into<PathBuf>) -> Self {
        self.srcs.push(src.into());
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

    pub fn primary_dst(&self) -> Option<&Path> {
        self.dsts.first().map(PathBuf::as_path)
    }

    pub fn expected(&self) -> Expected<'_> {
        Expected {
            size: self.size,
            mtime: self.mtime,
            digests: &self.digests,
        }
    }

    /// The explicit mtime, or else the newest mtime among sources that exist.
    pub fn effective_mtime(&self) -> Option<DateTime<Utc>> {
        self.mtime.or_else(|| latest_mtime(&self.srcs))
    }
}

/// Newest modification time among the paths that currently exist.
pub fn latest_mtime(paths: &[PathBuf]) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .filter_map(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
        .map(freshen_fs::to_utc)
        .max()
}
