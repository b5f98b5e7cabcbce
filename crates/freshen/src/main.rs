use std::process::ExitCode;

use clap::Parser;
use freshen_artifact::TransformRegistry;
use freshen_sched::BatchSummary;

use crate::cli::{App, Commands};

mod cli;
mod logging;
mod manifest;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();
    logging::init(app.verbose);

    let result = match app.cmd {
        Commands::Run(arg) => arg.run(app.verbose).await.map(outcome),
        Commands::Fetch(arg) => arg.run(app.verbose).await.map(outcome),
        Commands::Worker => serve().await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn outcome(summary: BatchSummary) -> ExitCode {
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Job failures travel in the status records; only a broken exchange fails the process.
async fn serve() -> anyhow::Result<ExitCode> {
    let record = freshen_sched::serve_worker(tokio::io::stdin(), tokio::io::stdout(), &TransformRegistry::builtin()).await?;
    tracing::debug!(status = ?record.status, "worker finished");
    Ok(ExitCode::SUCCESS)
}
