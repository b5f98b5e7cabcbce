use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use freshen_fetch::{FetchOptions, Fetcher, ReqwestClient, Session};
use freshen_policy::{ErrorKind, IdempotencyPolicy, StatusRecord, StatusSender};
use futures_util::FutureExt;

use crate::job::Job;

/// Runs `job`, turning a panic into a terminal `Internal` error record on
/// `status`. Whatever happens, exactly one terminal record comes back.
pub async fn guard<F>(status: &StatusSender, job: F) -> StatusRecord
where
    F: Future<Output = StatusRecord>,
{
    match AssertUnwindSafe(job).catch_unwind().await {
        Ok(record) => record,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(path = ?status.path(), %message, "job panicked");
            let record = StatusRecord::error(ErrorKind::Internal, format!("job panicked: {message}"));
            status.send(record.clone()).await;
            record
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// What in-process jobs share: one HTTP session for every fetch.
pub(crate) struct LocalContext {
    pub session: Arc<Session<ReqwestClient>>,
    pub options: FetchOptions,
    pub policy_override: Option<IdempotencyPolicy>,
}

/// Runs `job` in this process. Artifacts go to the blocking pool; a panic
/// there is re-raised here so that [`guard`] sees it.
pub(crate) async fn run_local(job: Job, ctx: &LocalContext, status: StatusSender) -> StatusRecord {
    match job {
        Job::Fetch(spec) => {
            Fetcher::new(spec, Arc::clone(&ctx.session))
                .with_options(ctx.options.clone())
                .run(ctx.policy_override, &status)
                .await
        }
        Job::Artifact(artifact) => {
            let policy = ctx.policy_override;
            let sender = status.clone();
            match tokio::task::spawn_blocking(move || artifact.run(policy, &sender)).await {
                Ok(record) => record,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    Err(err) => {
                        let record = StatusRecord::error(ErrorKind::Internal, err);
                        status.send(record.clone()).await;
                        record
                    }
                },
            }
        }
    }
}
