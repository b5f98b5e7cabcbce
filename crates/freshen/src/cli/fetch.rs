use std::path::PathBuf;

use freshen_fetch::{FetchSpec, ResumeFallback};
use freshen_sched::{BatchSummary, Job};

use super::BatchArgs;
use crate::manifest::Settings;

#[derive(Debug, Clone, clap::Args)]
pub struct FetchArg {
    pub url: String,
    /// Destination file, or an existing directory.
    pub dst: PathBuf,
    /// Expected digest, `algorithm:hex`. Repeatable; only the highest-priority algorithm is checked.
    #[arg(long = "digest", value_name = "ALGO:HEX", value_parser = parse_digest)]
    pub digests: Vec<(String, String)>,
    /// Expected size in bytes.
    #[arg(long)]
    pub size: Option<u64>,
    /// Resume a partial download even when no digest can vouch for it.
    #[arg(long)]
    pub continue_without_digest: bool,
    #[command(flatten)]
    pub batch: BatchArgs,
}

impl FetchArg {
    pub fn spec(&self) -> FetchSpec {
        let mut spec = FetchSpec::new(&self.url, &self.dst);
        if let Some(size) = self.size {
            spec = spec.size(size);
        }
        for (algorithm, hex) in &self.digests {
            spec = spec.digest(algorithm, hex);
        }
        if self.continue_without_digest {
            spec = spec.if_no_digest(ResumeFallback::Continue);
        }
        spec
    }

    pub async fn run(self, verbose: u8) -> anyhow::Result<BatchSummary> {
        let mut settings = Settings::default();
        self.batch.apply(&mut settings);
        let jobs = vec![Job::from(self.spec())];
        super::execute(&settings, jobs, verbose).await
    }
}

fn parse_digest(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((algorithm, hex)) if !algorithm.is_empty() && !hex.is_empty() => {
            Ok((algorithm.to_string(), hex.to_string()))
        }
        _ => Err(format!("expected 'algorithm:hex', got '{raw}'")),
    }
}
