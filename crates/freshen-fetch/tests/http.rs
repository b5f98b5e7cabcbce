//! End-to-end fetches against a local HTTP server.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use freshen_fetch::{BearerToken, FetchOptions, FetchSpec, Fetcher, ReqwestClient, ResumeFallback, Session};
use freshen_policy::{ChecksumOutcome, ErrorKind, IdempotencyPolicy, Status, StatusRecord};
use freshen_verify::{DigestAlgorithm, digest_reader};
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

fn body() -> Vec<u8> {
    (0..100_000u32).map(|i| (i % 251) as u8).collect()
}

fn sha256(data: &[u8]) -> String {
    digest_reader(data, DigestAlgorithm::Sha256).unwrap()
}

fn session() -> Arc<Session<ReqwestClient>> {
    Arc::new(Session::new(ReqwestClient::new().unwrap()))
}

fn fast() -> FetchOptions {
    FetchOptions::default().retry_backoff(Duration::from_millis(10))
}

async fn run(fetcher: &Fetcher<ReqwestClient>, policy: Option<IdempotencyPolicy>) -> (StatusRecord, Vec<StatusRecord>) {
    let (tx, mut rx) = freshen_policy::channel(4096);
    let terminal = fetcher.run(policy, &tx).await;
    drop(tx);
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    (terminal, records)
}

/// Serves `body` with byte-range support. HEAD gets the same headers as GET.
struct Ranged(Vec<u8>);

impl Respond for Ranged {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let len = self.0.len();
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'))
            .map(|(start, end)| (start.parse::<usize>().ok(), end.parse::<usize>().ok()));
        match range {
            Some((Some(start), end)) if start < len => {
                let end = end.unwrap_or(len - 1).min(len - 1);
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", format!("bytes {start}-{end}/{len}"))
                    .insert_header("Last-Modified", LAST_MODIFIED)
                    .set_body_bytes(self.0[start..=end].to_vec())
            }
            Some(_) => ResponseTemplate::new(416),
            None => ResponseTemplate::new(200)
                .insert_header("Last-Modified", LAST_MODIFIED)
                .set_body_bytes(self.0.clone()),
        }
    }
}

#[tokio::test]
async fn fresh_download_is_verified_and_dated() {
    let server = MockServer::start().await;
    let data = body();
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(data.clone())
                .insert_header("Last-Modified", LAST_MODIFIED),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).digest("sha256", sha256(&data));
    let (terminal, records) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), data);
    assert!(records.iter().any(|r| r.checksum == Some(ChecksumOutcome::Ok)));
    let last_progress = records.iter().filter(|r| r.done.is_some()).last().unwrap();
    assert_eq!(last_progress.done, Some(data.len() as u64));
    assert_eq!(last_progress.done_pct, Some(100.0));
    assert!(last_progress.dspeed.is_some() && last_progress.wspeed.is_some() && last_progress.tspeed.is_some());

    let mtime = freshen_fs::modified_utc(&dst).unwrap();
    assert_eq!(mtime, Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());
    for sidecar in ["a.bin.download", "a.bin.lock", "a.bin.checksum"] {
        assert!(!dir.path().join(sidecar).exists(), "{sidecar}");
    }
}

#[tokio::test]
async fn second_run_is_skipped() {
    let server = MockServer::start().await;
    let data = body();
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).digest("sha256", sha256(&data));
    let fetcher = Fetcher::new(spec, session());

    assert_eq!(run(&fetcher, None).await.0.status, Some(Status::Done));
    let before = freshen_fs::modified_utc(&dst).unwrap();
    let (terminal, _) = run(&fetcher, None).await;
    assert_eq!(terminal.status, Some(Status::Skipped));
    assert_eq!(freshen_fs::modified_utc(&dst).unwrap(), before);
}

#[tokio::test]
async fn resume_uses_range_request() {
    let server = MockServer::start().await;
    let data = body();
    Mock::given(path("/a.bin")).respond_with(Ranged(data.clone())).mount(&server).await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    let digest = sha256(&data);
    std::fs::write(dir.path().join("a.bin.download"), &data[..40_000]).unwrap();
    std::fs::write(dir.path().join("a.bin.checksum"), &digest).unwrap();

    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).digest("sha256", &digest);
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), data);
    let requests = server.received_requests().await.unwrap();
    let ranged_get = requests
        .iter()
        .find(|r| r.method.as_str() == "GET")
        .and_then(|r| r.headers.get("range"))
        .map(|v| v.to_str().unwrap().to_string());
    assert_eq!(ranged_get.as_deref(), Some("bytes=40000-"));
}

#[tokio::test]
async fn resume_without_range_support_skips_client_side() {
    let server = MockServer::start().await;
    let data = body();
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    let digest = sha256(&data);
    std::fs::write(dir.path().join("a.bin.download"), &data[..12_345]).unwrap();
    std::fs::write(dir.path().join("a.bin.checksum"), &digest).unwrap();

    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).digest("sha256", &digest);
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), data);
}

#[tokio::test]
async fn unranged_body_shorter_than_partial_replaces_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'N'; 100]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    std::fs::write(dir.path().join("a.bin.download"), vec![b'O'; 500]).unwrap();

    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).if_no_digest(ResumeFallback::Continue);
    let (terminal, _) = run(&Fetcher::new(spec, session()).with_options(fast()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), vec![b'N'; 100]);
    assert!(!dir.path().join("a.bin.download").exists());
}

#[tokio::test]
async fn partial_larger_than_remote_restarts_from_zero() {
    let server = MockServer::start().await;
    let data: Vec<u8> = (0..100u8).collect();
    Mock::given(path("/a.bin")).respond_with(Ranged(data.clone())).mount(&server).await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    std::fs::write(dir.path().join("a.bin.download"), vec![b'O'; 150]).unwrap();

    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).if_no_digest(ResumeFallback::Continue);
    let (terminal, _) = run(&Fetcher::new(spec, session()).with_options(fast()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), data);
    assert!(!dir.path().join("a.bin.download").exists());
    let requests = server.received_requests().await.unwrap();
    let gets: Vec<_> = requests.iter().filter(|r| r.method.as_str() == "GET").collect();
    assert_eq!(gets.len(), 1);
    assert!(gets[0].headers.get("range").is_none());
}

#[tokio::test]
async fn stale_partial_with_other_digest_restarts() {
    let server = MockServer::start().await;
    let data = body();
    Mock::given(path("/a.bin")).respond_with(Ranged(data.clone())).mount(&server).await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    std::fs::write(dir.path().join("a.bin.download"), b"garbage from another version").unwrap();
    std::fs::write(dir.path().join("a.bin.checksum"), "0000").unwrap();

    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).digest("sha256", sha256(&data));
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read(&dst).unwrap(), data);
}

#[tokio::test]
async fn transient_status_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst);
    let (terminal, _) = run(&Fetcher::new(spec, session()).with_options(fast()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "finally");
}

/// Answers 503 until `failures` requests have been seen, then 200, and
/// notes when each request arrived.
struct Flaky {
    failures: usize,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for Flaky {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let mut arrivals = self.arrivals.lock().unwrap();
        arrivals.push(Instant::now());
        if arrivals.len() <= self.failures {
            ResponseTemplate::new(503)
        } else {
            ResponseTemplate::new(200).set_body_string("finally")
        }
    }
}

#[tokio::test]
async fn retries_wait_an_exponential_backoff() {
    let server = MockServer::start().await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .respond_with(Flaky {
            failures: 2,
            arrivals: arrivals.clone(),
        })
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst);
    let backoff = Duration::from_millis(150);
    let options = FetchOptions::default().retry_backoff(backoff);
    let (terminal, _) = run(&Fetcher::new(spec, session()).with_options(options), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 3);
    assert!(arrivals[1] - arrivals[0] >= backoff, "{:?}", arrivals[1] - arrivals[0]);
    assert!(arrivals[2] - arrivals[1] >= backoff * 2, "{:?}", arrivals[2] - arrivals[1]);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst);
    let (terminal, _) = run(&Fetcher::new(spec, session()).with_options(fast()), None).await;

    assert_eq!(terminal.status, Some(Status::Error));
    assert_eq!(terminal.kind, Some(ErrorKind::MalformedRequest));
    assert!(terminal.message.unwrap().starts_with("[MalformedRequest]"));
    assert!(!dst.exists());
}

#[tokio::test]
async fn redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let spec = FetchSpec::new(format!("{}/old", server.uri()), &dst);
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "moved");
}

#[tokio::test]
async fn refused_request_is_retried_after_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("private"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let session = Arc::new(Session::new(ReqwestClient::new().unwrap()).with_authenticator(BearerToken::new("s3cret")));
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst);
    let (terminal, _) = run(&Fetcher::new(spec, session), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "private");
}

#[tokio::test]
async fn checksum_mismatch_keeps_destination_stale() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("unexpected")
                .insert_header("Last-Modified", LAST_MODIFIED),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst).digest("sha256", sha256(b"expected"));
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Error));
    assert_eq!(terminal.kind, Some(ErrorKind::ChecksumMismatch));
    assert_eq!(terminal.checksum, Some(ChecksumOutcome::Differs));
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "unexpected");
    assert_ne!(
        freshen_fs::modified_utc(&dst).unwrap(),
        Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()
    );
}

#[tokio::test]
async fn directory_destination_takes_url_file_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let spec = FetchSpec::new(format!("{}/files/report.csv", server.uri()), dir.path());
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.status, Some(Status::Done), "{terminal:?}");
    assert_eq!(std::fs::read_to_string(dir.path().join("report.csv")).unwrap(), "a,b\n");
}

#[tokio::test]
async fn refresh_compares_server_mtime() {
    let server = MockServer::start().await;
    Mock::given(path("/a.bin")).respond_with(Ranged(body())).mount(&server).await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.bin");
    let spec = FetchSpec::new(format!("{}/a.bin", server.uri()), &dst).policy(IdempotencyPolicy::RefreshByTime);
    let fetcher = Fetcher::new(spec, session());

    assert_eq!(run(&fetcher, None).await.0.status, Some(Status::Done));
    assert_eq!(run(&fetcher, None).await.0.status, Some(Status::Skipped));

    std::fs::write(&dst, b"local edit").unwrap();
    let (terminal, _) = run(&fetcher, None).await;
    assert_eq!(terminal.status, Some(Status::Done));
    assert_eq!(std::fs::read(&dst).unwrap(), body());

    let (forced, _) = run(&fetcher, Some(IdempotencyPolicy::Overwrite)).await;
    assert_eq!(forced.status, Some(Status::Done));
}

#[tokio::test]
async fn error_policy_refuses_existing_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dst = dir.path().join("a.txt");
    std::fs::write(&dst, "old").unwrap();
    let spec = FetchSpec::new(format!("{}/a.txt", server.uri()), &dst).policy(IdempotencyPolicy::ErrorIfExists);
    let (terminal, _) = run(&Fetcher::new(spec, session()), None).await;

    assert_eq!(terminal.kind, Some(ErrorKind::PreconditionFailed));
    assert_eq!(std::fs::read_to_string(&dst).unwrap(), "old");
}
