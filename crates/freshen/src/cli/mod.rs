pub mod fetch;
pub mod run;

use std::io::IsTerminal;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use freshen_artifact::TransformRegistry;
use freshen_policy::IdempotencyPolicy;
use freshen_sched::{
    Backend, BarRenderer, BatchSummary, ErrorMode, Job, PathDisplay, PlainRenderer, Renderer, SchedError, Scheduler,
    SilentRenderer, WorkerCommand,
};
use serde::Deserialize;

use crate::manifest::Settings;

#[derive(Debug, Parser)]
#[command(name = "freshen", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// More log output (-v info, -vv debug). FRESHEN_LOG or RUST_LOG take precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every job of a manifest.
    #[command(alias = "r", name = "run")]
    Run(run::RunArg),
    /// Fetch one URL.
    #[command(alias = "f", name = "fetch")]
    Fetch(fetch::FetchArg),
    /// Worker-process entry point: one JSON job on stdin, JSON-lines status on stdout.
    #[command(name = "worker", hide = true)]
    Worker,
}

/// How progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Progress {
    /// Bars on a terminal, lines otherwise.
    #[default]
    Auto,
    Bar,
    Plain,
    Off,
}

impl Progress {
    fn renderer(self) -> Box<dyn Renderer> {
        let resolved = match self {
            Self::Auto if std::io::stderr().is_terminal() => Self::Bar,
            Self::Auto => Self::Plain,
            other => other,
        };
        match resolved {
            Self::Bar => Box::new(BarRenderer::new()),
            Self::Plain => Box::new(PlainRenderer::new(std::io::stdout())),
            _ => Box::new(SilentRenderer),
        }
    }
}

/// Flags shared by every batch-running command; each one overrides the
/// manifest setting of the same name.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BatchArgs {
    #[arg(long)]
    pub backend: Option<Backend>,
    /// Jobs in flight at once.
    #[arg(short, long)]
    pub jobs: Option<usize>,
    /// Policy applied to every job, replacing their own.
    #[arg(short, long)]
    pub policy: Option<IdempotencyPolicy>,
    #[arg(long)]
    pub on_error: Option<ErrorMode>,
    #[arg(long)]
    pub path_display: Option<PathDisplay>,
    #[arg(long, value_enum)]
    pub progress: Option<Progress>,
    #[arg(long)]
    pub max_attempts: Option<u32>,
    #[arg(long, value_name = "MS")]
    pub retry_backoff_ms: Option<u64>,
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
    /// Extra request header, `Name: value`. Repeatable.
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
    /// Bearer token offered when a server refuses a request.
    #[arg(long, env = "FRESHEN_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,
}

impl BatchArgs {
    pub fn apply(&self, settings: &mut Settings) {
        settings.backend = self.backend.or(settings.backend);
        settings.jobs = self.jobs.or(settings.jobs);
        settings.policy = self.policy.or(settings.policy);
        settings.on_error = self.on_error.or(settings.on_error);
        settings.path_display = self.path_display.or(settings.path_display);
        settings.progress = self.progress.or(settings.progress);

        let transfer = &mut settings.transfer;
        if let Some(attempts) = self.max_attempts {
            transfer.max_attempts = attempts;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            transfer.retry_backoff_ms = backoff;
        }
        if self.timeout_ms.is_some() {
            transfer.timeout_ms = self.timeout_ms;
        }
        for (name, value) in &self.headers {
            transfer.headers.insert(name.clone(), value.clone());
        }
        if self.bearer_token.is_some() {
            transfer.bearer_token.clone_from(&self.bearer_token);
        }
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.trim().to_string())),
        _ => Err(format!("expected 'Name: value', got '{raw}'")),
    }
}

/// Runs `jobs` under `settings` and reports the batch outcome.
pub async fn execute(settings: &Settings, jobs: Vec<Job>, verbose: u8) -> anyhow::Result<BatchSummary> {
    let mut config = settings.config();
    if config.backend == Backend::Workers {
        let mut command = WorkerCommand::current()?;
        for _ in 0..verbose {
            command = command.arg("-v");
        }
        config = config.worker_command(command);
    }
    tracing::info!(jobs = jobs.len(), backend = %config.backend, "running batch");

    let renderer = settings.progress.unwrap_or_default().renderer();
    let scheduler = Scheduler::new(config).with_registry(TransformRegistry::builtin());
    match scheduler.run(jobs, renderer).await {
        Ok(summary) => Ok(summary),
        Err(SchedError::Aborted { path, message, .. }) => anyhow::bail!("batch aborted at {path}: {message}"),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        App::command().debug_assert();
    }

    #[test]
    fn test_flags_override_manifest() {
        let app = App::try_parse_from([
            "freshen", "run", "m.toml", "--backend", "workers", "-j", "3", "-p", "refresh", "-H", "X-Key: abc",
            "--timeout-ms", "2500",
        ])
        .unwrap();
        let Commands::Run(arg) = app.cmd else {
            panic!("expected run");
        };
        let mut settings = Settings {
            jobs: Some(9),
            on_error: Some(ErrorMode::Raise),
            ..Settings::default()
        };
        arg.batch.apply(&mut settings);
        assert_eq!(settings.backend, Some(Backend::Workers));
        assert_eq!(settings.jobs, Some(3));
        assert_eq!(settings.policy, Some(IdempotencyPolicy::RefreshByTime));
        assert_eq!(settings.on_error, Some(ErrorMode::Raise));
        assert_eq!(settings.transfer.timeout_ms, Some(2500));
        assert_eq!(settings.transfer.headers["X-Key"], "abc");
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("Accept: */*").unwrap(), ("Accept".into(), "*/*".into()));
        assert!(parse_header("no-colon").is_err());
    }

    #[test]
    fn test_worker_is_hidden() {
        use clap::CommandFactory;
        let command = App::command();
        let worker = command.find_subcommand("worker").unwrap();
        assert!(worker.is_hide_set());
    }
}
