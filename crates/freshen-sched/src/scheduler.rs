use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use freshen_artifact::TransformRegistry;
use freshen_fetch::{ReqwestClient, Session};
use freshen_policy::{StatusReceiver, StatusRecord, StatusSender};
use tokio::task::JoinSet;

use crate::config::{Backend, ErrorMode, PathDisplay, SchedulerConfig, WorkerCommand};
use crate::display::PathFormatter;
use crate::error::{Result, SchedError};
use crate::guard::{LocalContext, guard, run_local};
use crate::job::Job;
use crate::live::{BatchSummary, LiveView};
use crate::render::Renderer;
use crate::worker::{WorkerContext, run_in_worker};

type Failure = (String, StatusRecord);

/// Runs batches of [`Job`]s under one [`SchedulerConfig`].
///
/// Jobs are pulled from the input lazily, at most `concurrency` at a time,
/// except with [`PathDisplay::Short`]: computing the shared directory needs
/// every destination up front, so the whole input is collected first and
/// must be finite.
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<TransformRegistry>,
    session: Option<Arc<Session<ReqwestClient>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(TransformRegistry::builtin()),
            session: None,
        }
    }

    /// Transforms known to this process. Worker processes resolve names
    /// against their own registry.
    #[must_use]
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Session for the single backend, instead of one built from
    /// [`TransferSettings`](crate::TransferSettings).
    #[must_use]
    pub fn with_session(mut self, session: Arc<Session<ReqwestClient>>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Runs every job and returns the batch summary once the renderer has
    /// seen the last record. In [`ErrorMode::Raise`] the first failure stops
    /// the batch and comes back as [`SchedError::Aborted`]; jobs already
    /// running finish first.
    pub async fn run<I>(&self, jobs: I, renderer: Box<dyn Renderer>) -> Result<BatchSummary>
    where
        I: IntoIterator<Item = Job>,
    {
        let (status, rx) = freshen_policy::channel(self.config.queue_bound);
        let render = spawn_renderer(rx, renderer)?;

        let failure = match self.config.path_display {
            PathDisplay::Short => {
                let jobs: Vec<Job> = jobs.into_iter().collect();
                let targets: Vec<PathBuf> = jobs.iter().map(Job::target).collect();
                let formatter = PathFormatter::short(targets.iter().map(PathBuf::as_path));
                self.dispatch(jobs.into_iter(), &formatter, &status).await
            }
            mode => self.dispatch(jobs.into_iter(), &PathFormatter::new(mode), &status).await,
        };
        drop(status);

        let (view, mut renderer) = tokio::task::spawn_blocking(move || render.join())
            .await
            .map_err(|e| SchedError::Renderer(e.to_string()))?
            .map_err(|_| SchedError::Renderer("render thread panicked".into()))?;
        let summary = view.summary();
        renderer.finish(&summary);
        tracing::info!(
            done = summary.done,
            skipped = summary.skipped,
            errors = summary.errors,
            "batch finished"
        );

        match failure? {
            Some((path, record)) => Err(SchedError::Aborted {
                path,
                message: record.message.unwrap_or_default(),
                summary: Box::new(summary),
            }),
            None => Ok(summary),
        }
    }

    async fn dispatch<I>(&self, jobs: I, formatter: &PathFormatter, status: &StatusSender) -> Result<Option<Failure>>
    where
        I: Iterator<Item = Job>,
    {
        let concurrency = self.config.concurrency.max(1);
        let mode = self.config.on_error;
        tracing::debug!(backend = %self.config.backend, concurrency, %mode, "starting batch");

        match self.config.backend {
            Backend::Single => {
                let session = match &self.session {
                    Some(session) => Arc::clone(session),
                    None => Arc::new(self.config.transfer.session()?),
                };
                let ctx = Arc::new(LocalContext {
                    session,
                    options: self.config.transfer.fetch_options(),
                    policy_override: self.config.policy_override,
                });
                let launch = |job: Job, sender: StatusSender| {
                    let ctx = Arc::clone(&ctx);
                    async move { run_local(job, &ctx, sender).await }
                };
                Ok(drive(jobs, concurrency, mode, formatter, status, launch).await)
            }
            Backend::Workers => {
                let command = match &self.config.worker_command {
                    Some(command) => command.clone(),
                    None => WorkerCommand::current().map_err(SchedError::WorkerExecutable)?,
                };
                let ctx = Arc::new(WorkerContext {
                    command,
                    policy_override: self.config.policy_override,
                    transfer: self.config.transfer.clone(),
                });
                let launch = |job: Job, sender: StatusSender| {
                    let ctx = Arc::clone(&ctx);
                    async move { run_in_worker(job, &ctx, sender).await }
                };
                Ok(drive(jobs, concurrency, mode, formatter, status, launch).await)
            }
        }
    }
}

/// Keeps up to `concurrency` guarded jobs in flight. In
/// [`ErrorMode::Raise`] the first failure stops new jobs from starting and
/// is returned once the jobs already running have sent their terminal
/// records.
async fn drive<I, F, Fut>(
    jobs: I,
    concurrency: usize,
    mode: ErrorMode,
    formatter: &PathFormatter,
    status: &StatusSender,
    launch: F,
) -> Option<Failure>
where
    I: Iterator<Item = Job>,
    F: Fn(Job, StatusSender) -> Fut,
    Fut: Future<Output = StatusRecord> + Send + 'static,
{
    let mut jobs = jobs.fuse();
    let mut tasks = JoinSet::new();

    loop {
        while tasks.len() < concurrency {
            let Some(job) = jobs.next() else {
                break;
            };
            let label = formatter.format(&job.target());
            let sender = status.for_path(label.clone());
            let work = launch(job, sender.clone());
            tasks.spawn(async move {
                let record = guard(&sender, work).await;
                (label, record)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            return None;
        };
        let (label, record) = match joined {
            Ok(done) => done,
            Err(err) => {
                tracing::error!(%err, "job task lost");
                continue;
            }
        };
        if record.is_error() && mode == ErrorMode::Raise {
            tracing::error!(path = %label, running = tasks.len(), "aborting batch");
            while let Some(joined) = tasks.join_next().await {
                if let Err(err) = joined {
                    tracing::error!(%err, "job task lost");
                }
            }
            return Some((label, record));
        }
    }
}

fn spawn_renderer(
    mut rx: StatusReceiver,
    mut renderer: Box<dyn Renderer>,
) -> Result<thread::JoinHandle<(LiveView, Box<dyn Renderer>)>> {
    let handle = thread::Builder::new()
        .name("freshen-render".into())
        .spawn(move || {
            let mut view = LiveView::new();
            while let Some(record) = rx.blocking_recv() {
                let merged = view.apply(&record);
                renderer.update(merged);
            }
            (view, renderer)
        })?;
    Ok(handle)
}
