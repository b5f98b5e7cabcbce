//! In-process batches.

use std::io::Write;
use std::sync::{Arc, Mutex};

use freshen_artifact::{Artifact, WriteText, transform_fn};
use freshen_fetch::FetchSpec;
use freshen_policy::{ArtifactSpec, ErrorKind, IdempotencyPolicy, Status, StatusRecord};
use freshen_sched::{
    BatchSummary, ErrorMode, Job, PathDisplay, Renderer, SchedError, Scheduler, SchedulerConfig, SilentRenderer,
};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<StatusRecord>>>);

impl Renderer for Collect {
    fn update(&mut self, view: &StatusRecord) {
        self.0.lock().unwrap().push(view.clone());
    }
}

fn write(dst: impl Into<std::path::PathBuf>, text: &str) -> Job {
    Artifact::new(ArtifactSpec::new(dst), Arc::new(WriteText::new(text))).into()
}

fn final_status(summary: &BatchSummary, suffix: &str) -> Option<Status> {
    summary
        .records
        .iter()
        .find(|r| r.path.as_deref().is_some_and(|p| p.ends_with(suffix)))
        .and_then(|r| r.status)
}

#[tokio::test(flavor = "multi_thread")]
async fn mixed_batch_then_rerun_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remote.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("remote"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let jobs = || {
        vec![
            write(dir.path().join("a.txt"), "a"),
            write(dir.path().join("b.txt"), "b"),
            FetchSpec::new(format!("{}/remote.txt", server.uri()), dir.path().join("remote.txt")).into(),
        ]
    };
    let scheduler = Scheduler::new(SchedulerConfig::default().concurrency(2));

    let first = scheduler.run(jobs(), Box::new(SilentRenderer)).await.unwrap();
    assert_eq!((first.done, first.skipped, first.errors), (3, 0, 0));
    assert_eq!(std::fs::read_to_string(dir.path().join("remote.txt")).unwrap(), "remote");

    let second = scheduler.run(jobs(), Box::new(SilentRenderer)).await.unwrap();
    assert_eq!((second.done, second.skipped, second.errors), (0, 3, 0));
    assert!(second.records.iter().all(|r| r.status == Some(Status::Skipped)));
}

#[tokio::test(flavor = "multi_thread")]
async fn yield_mode_reports_and_continues() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("taken.txt"), "mine").unwrap();
    let refused = Artifact::new(ArtifactSpec::new(dir.path().join("taken.txt")), Arc::new(WriteText::new("x")))
        .policy(IdempotencyPolicy::ErrorIfExists);
    let jobs: Vec<Job> = vec![refused.into(), write(dir.path().join("ok.txt"), "ok")];

    let scheduler = Scheduler::new(SchedulerConfig::default().on_error(ErrorMode::Yield));
    let summary = scheduler.run(jobs, Box::new(SilentRenderer)).await.unwrap();

    assert_eq!((summary.done, summary.errors), (1, 1));
    assert!(!summary.is_success());
    let error = summary.records.iter().find(|r| r.is_error()).unwrap();
    assert_eq!(error.kind, Some(ErrorKind::PreconditionFailed));
    assert!(error.path.as_deref().unwrap().ends_with("taken.txt"));
    assert_eq!(std::fs::read_to_string(dir.path().join("taken.txt")).unwrap(), "mine");
}

#[tokio::test(flavor = "multi_thread")]
async fn raise_mode_stops_at_first_failure() {
    let dir = tempdir().unwrap();
    let failing = Artifact::new(
        ArtifactSpec::new(dir.path().join("bad.txt")),
        Arc::new(transform_fn("fail", |_| Err("no input".into()))),
    );
    let later = (0..5).map(|i| write(dir.path().join(format!("later-{i}.txt")), "x"));
    let jobs = std::iter::once(Job::from(failing)).chain(later);

    let scheduler = Scheduler::new(SchedulerConfig::default().concurrency(1).on_error(ErrorMode::Raise));
    let err = scheduler.run(jobs, Box::new(SilentRenderer)).await.unwrap_err();

    let SchedError::Aborted { path, message, summary } = err else {
        panic!("expected an aborted batch");
    };
    assert!(path.ends_with("bad.txt"));
    assert!(message.starts_with("[TransformFailure]"));
    assert_eq!(summary.errors, 1);
    assert!(!dir.path().join("later-4.txt").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn raise_mode_lets_running_jobs_finish() {
    let dir = tempdir().unwrap();
    let failing = Artifact::new(
        ArtifactSpec::new(dir.path().join("bad.txt")),
        Arc::new(transform_fn("fail", |_| Err("no input".into()))),
    );
    let slow = Artifact::new(
        ArtifactSpec::new(dir.path().join("slow.txt")),
        Arc::new(transform_fn("slow", |ctx| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            ctx.with_output(0, |out| out.write_all(b"slow"))?;
            Ok(())
        })),
    );
    let later = (0..3).map(|i| write(dir.path().join(format!("later-{i}.txt")), "x"));
    let jobs = [Job::from(failing), Job::from(slow)].into_iter().chain(later);

    let scheduler = Scheduler::new(SchedulerConfig::default().concurrency(2).on_error(ErrorMode::Raise));
    let err = scheduler.run(jobs, Box::new(SilentRenderer)).await.unwrap_err();

    let SchedError::Aborted { path, summary, .. } = err else {
        panic!("expected an aborted batch");
    };
    assert!(path.ends_with("bad.txt"));
    assert_eq!(final_status(&summary, "slow.txt"), Some(Status::Done));
    assert_eq!(std::fs::read_to_string(dir.path().join("slow.txt")).unwrap(), "slow");
    assert_eq!((summary.done, summary.errors), (1, 1));
    assert!(!dir.path().join("later-0.txt").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn policy_override_applies_to_every_job() {
    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    std::fs::write(&dst, "stale").unwrap();
    let jobs = || {
        vec![Job::from(
            Artifact::new(ArtifactSpec::new(&dst), Arc::new(WriteText::new("fresh"))).policy(IdempotencyPolicy::Skip),
        )]
    };

    let skipped = Scheduler::new(SchedulerConfig::default()).run(jobs(), Box::new(SilentRenderer)).await.unwrap();
    assert_eq!(skipped.skipped, 1);

    let config = SchedulerConfig::default().policy_override(Some(IdempotencyPolicy::Overwrite));
    let forced = Scheduler::new(config).run(jobs(), Box::new(SilentRenderer)).await.unwrap();
    assert_eq!(forced.done, 1);
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "fresh");
}

#[tokio::test(flavor = "multi_thread")]
async fn short_paths_are_relative_to_shared_directory() {
    let dir = tempdir().unwrap();
    let jobs = vec![
        write(dir.path().join("raw/x/a.txt"), "a"),
        write(dir.path().join("raw/b.txt"), "b"),
    ];
    let collect = Collect::default();
    let config = SchedulerConfig::default().path_display(PathDisplay::Short);
    let summary = Scheduler::new(config).run(jobs, Box::new(collect.clone())).await.unwrap();

    assert_eq!(final_status(&summary, "b.txt"), Some(Status::Done));
    let mut paths: Vec<String> = summary.records.iter().filter_map(|r| r.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, ["b.txt", "x/a.txt"]);
    assert!(collect.0.lock().unwrap().iter().all(|r| r.path.is_some()));
}

#[tokio::test(flavor = "multi_thread")]
async fn renderer_sees_merged_views_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("blob.bin");
    let collect = Collect::default();
    let jobs = vec![Job::from(FetchSpec::new(format!("{}/blob.bin", server.uri()), &dst))];
    Scheduler::new(SchedulerConfig::default()).run(jobs, Box::new(collect.clone())).await.unwrap();

    let views = collect.0.lock().unwrap().clone();
    let last = views.last().unwrap();
    assert_eq!(last.status, Some(Status::Done));
    assert_eq!(last.done, Some(4096));
    assert!(views[..views.len() - 1].iter().all(|v| v.status.is_none()));
}

#[tokio::test(flavor = "multi_thread")]
async fn closure_transforms_run_in_process() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("in.txt");
    std::fs::write(&src, "shout").unwrap();
    let upper = transform_fn("upper", |ctx| {
        let text = std::fs::read_to_string(&ctx.srcs()[0])?;
        ctx.with_output(0, |out| out.write_all(text.to_uppercase().as_bytes()))?;
        Ok(())
    });
    let artifact = Artifact::new(ArtifactSpec::new(dir.path().join("out.txt")).src(&src), Arc::new(upper));

    let summary = Scheduler::new(SchedulerConfig::default())
        .run(vec![Job::from(artifact)], Box::new(SilentRenderer))
        .await
        .unwrap();
    assert_eq!(summary.done, 1);
    assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "SHOUT");
}
