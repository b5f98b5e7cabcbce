//! Batch manifests.
//!
//! ```toml
//! [settings]
//! backend = "workers"
//! jobs = 8
//! on_error = "raise"
//!
//! [[fetch]]
//! url = "https://example.org/data.csv.gz"
//! dst = "raw/data.csv.gz"
//! digests = { sha256 = "..." }
//!
//! [[artifact]]
//! dsts = ["data.csv"]
//! srcs = ["raw/data.csv.gz"]
//! transform = { name = "gunzip" }
//! ```
//!
//! Relative paths are taken relative to the manifest's directory.
//! Timestamps are quoted RFC 3339 strings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use freshen_artifact::{Artifact, ArtifactDescriptor, TransformRegistry};
use freshen_fetch::FetchSpec;
use freshen_policy::IdempotencyPolicy;
use freshen_sched::{Backend, ErrorMode, Job, PathDisplay, SchedulerConfig, TransferSettings};
use serde::Deserialize;

use crate::cli::Progress;

/// The `[settings]` table. Anything left out keeps the scheduler default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: Option<Backend>,
    pub jobs: Option<usize>,
    /// Batch-wide policy override.
    pub policy: Option<IdempotencyPolicy>,
    pub on_error: Option<ErrorMode>,
    pub path_display: Option<PathDisplay>,
    pub queue_bound: Option<usize>,
    pub progress: Option<Progress>,
    #[serde(flatten)]
    pub transfer: TransferSettings,
}

impl Settings {
    pub fn config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::default()
            .policy_override(self.policy)
            .transfer(self.transfer.clone());
        if let Some(backend) = self.backend {
            config = config.backend(backend);
        }
        if let Some(jobs) = self.jobs {
            config = config.concurrency(jobs);
        }
        if let Some(mode) = self.on_error {
            config = config.on_error(mode);
        }
        if let Some(display) = self.path_display {
            config = config.path_display(display);
        }
        if let Some(bound) = self.queue_bound {
            config = config.queue_bound(bound);
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub fetch: Vec<FetchSpec>,
    #[serde(default)]
    pub artifact: Vec<ArtifactDescriptor>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
        let mut manifest = Self::parse(&text).with_context(|| format!("parsing manifest {}", path.display()))?;
        if let Some(base) = path.parent() {
            manifest.rebase(base);
        }
        Ok(manifest)
    }

    /// Anchors relative destinations and sources at `base`.
    pub fn rebase(&mut self, base: &Path) {
        for fetch in &mut self.fetch {
            fetch.dst = anchor(base, &fetch.dst);
        }
        for artifact in &mut self.artifact {
            let spec = &mut artifact.spec;
            for path in spec.dsts.iter_mut().chain(spec.srcs.iter_mut()) {
                *path = anchor(base, path);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fetch.len() + self.artifact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetches first, then artifacts, each in manifest order.
    pub fn into_jobs(self, registry: &TransformRegistry) -> anyhow::Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.fetch.into_iter().map(Job::from).collect();
        for descriptor in self.artifact {
            let target = descriptor.spec.dsts.first().cloned().unwrap_or_default();
            let artifact = Artifact::from_descriptor(descriptor, registry)
                .with_context(|| format!("artifact {}", target.display()))?;
            jobs.push(artifact.into());
        }
        Ok(jobs)
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() && !base.as_os_str().is_empty() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
