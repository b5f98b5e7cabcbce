use std::path::PathBuf;

use freshen_artifact::TransformRegistry;
use freshen_sched::BatchSummary;

use super::BatchArgs;
use crate::manifest::Manifest;

#[derive(Debug, Clone, clap::Args)]
pub struct RunArg {
    /// Batch manifest (TOML).
    pub manifest: PathBuf,
    #[command(flatten)]
    pub batch: BatchArgs,
}

impl RunArg {
    pub async fn run(self, verbose: u8) -> anyhow::Result<BatchSummary> {
        let mut manifest = Manifest::load(&self.manifest)?;
        self.batch.apply(&mut manifest.settings);
        if manifest.is_empty() {
            tracing::warn!(manifest = %self.manifest.display(), "manifest has no jobs");
        }
        let settings = manifest.settings.clone();
        let jobs = manifest.into_jobs(&TransformRegistry::builtin())?;
        super::execute(&settings, jobs, verbose).await
    }
}
