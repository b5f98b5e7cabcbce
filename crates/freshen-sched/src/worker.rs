//! Worker-process backend: one child per job, JSON in, JSON lines out.
//!
//! The parent writes one [`WorkerRequest`] to the child's stdin and closes
//! it. The child answers with one [`StatusRecord`] per line on stdout, the
//! last being terminal; its logs go to stderr.

use std::process::Stdio;
use std::sync::Arc;

use freshen_artifact::TransformRegistry;
use freshen_policy::{Classify, ErrorKind, IdempotencyPolicy, StatusRecord, StatusSender};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::config::{TransferSettings, WorkerCommand};
use crate::error::{Result, SchedError};
use crate::guard::{LocalContext, guard, run_local};
use crate::job::{Job, WorkerRequest};

pub(crate) struct WorkerContext {
    pub command: WorkerCommand,
    pub policy_override: Option<IdempotencyPolicy>,
    pub transfer: TransferSettings,
}

/// Parent side: runs `job` in a fresh child process and relays its records.
pub(crate) async fn run_in_worker(job: Job, ctx: &WorkerContext, status: StatusSender) -> StatusRecord {
    let outcome = match job.descriptor() {
        Ok(descriptor) => {
            let request = WorkerRequest {
                job: descriptor,
                policy_override: ctx.policy_override,
                transfer: ctx.transfer.clone(),
            };
            exchange(&ctx.command, &request, &status).await
        }
        Err(err) => Err(SchedError::Transform(err)),
    };

    match outcome {
        Ok(record) => record,
        Err(err) => {
            let kind = match &err {
                SchedError::Transform(err) => err.kind(),
                _ => ErrorKind::Internal,
            };
            tracing::error!(path = ?status.path(), %err, "worker job failed");
            let record = StatusRecord::error(kind, &err);
            status.send(record.clone()).await;
            record
        }
    }
}

async fn exchange(command: &WorkerCommand, request: &WorkerRequest, status: &StatusSender) -> Result<StatusRecord> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SchedError::Spawn {
            program: command.program.clone(),
            source,
        })?;
    tracing::debug!(path = ?status.path(), pid = ?child.id(), "worker started");

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| SchedError::Protocol("worker stdin unavailable".into()))?;
    stdin.write_all(&serde_json::to_vec(request)?).await?;
    stdin.shutdown().await?;
    drop(stdin);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SchedError::Protocol("worker stdout unavailable".into()))?;
    let mut lines = BufReader::new(stdout).lines();
    let mut terminal = None;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let record: StatusRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(path = ?status.path(), %err, %line, "unreadable worker output");
                continue;
            }
        };
        if record.is_terminal() {
            terminal = Some(record.clone());
        }
        status.send(record).await;
    }

    let exit = child.wait().await?;
    match terminal {
        Some(record) => Ok(record),
        None => {
            let record = StatusRecord::error(ErrorKind::Internal, format!("worker exited ({exit}) without reporting"));
            status.send(record.clone()).await;
            Ok(record)
        }
    }
}

/// Child side: reads one [`WorkerRequest`] from `input`, runs it, and
/// writes its records to `output` as JSON lines.
pub async fn serve_worker<R, W>(mut input: R, output: W, registry: &TransformRegistry) -> Result<StatusRecord>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut raw = String::new();
    input.read_to_string(&mut raw).await?;
    let request: WorkerRequest = serde_json::from_str(&raw)?;

    let (status, mut rx) = freshen_policy::channel(256);
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(record) = rx.recv().await {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        Ok::<_, SchedError>(())
    });

    let record = match request.job.into_job(registry) {
        Ok(job) => {
            let ctx = LocalContext {
                session: Arc::new(request.transfer.session()?),
                options: request.transfer.fetch_options(),
                policy_override: request.policy_override,
            };
            guard(&status, run_local(job, &ctx, status.clone())).await
        }
        Err(err) => {
            let record = StatusRecord::error(err.kind(), &err);
            status.send(record.clone()).await;
            record
        }
    };

    drop(status);
    writer
        .await
        .map_err(|e| SchedError::Protocol(format!("status writer failed: {e}")))??;
    Ok(record)
}
