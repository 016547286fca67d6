// Integration tests for Moth-Bench
//
// These tests drive the full pipeline against the built-in mock endpoint:
// runner, aggregation, reference loading, leaderboard and scorecard export.

use std::io::Write;
use std::path::Path;

use moth_bench::bench::{
    leaderboard::{self, LOCAL_ENTRY_NAME},
    reference, scorecard, BenchmarkRunner, MockChatServer, MockServerConfig, ProgressEvent,
    ReferenceRegistry, RunConfig, RunState, RunSummary,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

async fn start_mock(config: MockServerConfig) -> MockChatServer {
    let mut server = MockChatServer::new(config);
    server.start().await.expect("Failed to start mock server");
    server
}

fn run_config(url: &str) -> RunConfig {
    RunConfig {
        endpoint_url: url.to_string(),
        timeout_secs: 5,
        connect_timeout_secs: 1,
        ..Default::default()
    }
}

fn write_references(dir: &Path, body: &str) -> String {
    let path = dir.join("benchmarks.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path.to_string_lossy().into_owned()
}

fn export(dir: &Path, summary: &RunSummary, registry: &ReferenceRegistry) -> String {
    let rows = leaderboard::build(summary, registry);
    let out = dir.join("scorecard.html");
    scorecard::write_to(&out, summary, &rows).unwrap();
    std::fs::read_to_string(out).unwrap()
}

// ==================================================================================================
// End-to-end runs
// ==================================================================================================

#[tokio::test]
async fn test_full_run_ranks_local_between_references() {
    let dir = tempfile::tempdir().unwrap();
    let refs = write_references(
        dir.path(),
        r#"[{"name":"Slow Cloud (ref)","avg_seconds":30.0},{"name":"Instant (ref)","avg_seconds":0.0001}]"#,
    );

    let server = start_mock(MockServerConfig {
        latency_ms: 1,
        ..Default::default()
    })
    .await;

    let runner = BenchmarkRunner::new().unwrap();
    let mut handle = runner.start(run_config(&server.url())).unwrap();

    let mut finished = 0;
    let mut last = None;
    while let Some(event) = handle.next_event().await {
        if matches!(event, ProgressEvent::TestFinished { .. }) {
            finished += 1;
        }
        last = Some(event);
    }
    let summary = handle.wait().await.unwrap();

    assert_eq!(finished, 43);
    assert!(matches!(
        last,
        Some(ProgressEvent::RunFinished {
            completed: 43,
            total: 43,
            cancelled: false
        })
    ));
    assert_eq!(summary.success_count, 43);
    assert_eq!(server.request_count(), 43);
    assert_eq!(runner.state(), RunState::Completed);

    let registry = ReferenceRegistry::load_first(&reference::candidate_paths(Some(&refs)));
    assert_eq!(registry.len(), 2);
    let rows = leaderboard::build(&summary, &registry);
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Instant (ref)", LOCAL_ENTRY_NAME, "Slow Cloud (ref)"]);
    assert_eq!(leaderboard::local_row(&rows).unwrap().rank, 2);

    let html = export(dir.path(), &summary, &registry);
    assert!(html.contains("<tr class=\"local\">"));
    assert!(html.contains("Slow Cloud (ref)"));
    assert!(!html.contains("Run cancelled"));
}

#[tokio::test]
async fn test_unreachable_endpoint_records_failures_without_local_row() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = tempfile::tempdir().unwrap();
    let refs = write_references(dir.path(), r#"[{"name":"Ref A","avg_seconds":3.1}]"#);

    let runner = BenchmarkRunner::new().unwrap();
    let handle = runner
        .start(run_config(&format!("http://127.0.0.1:{}/v1", port)))
        .unwrap();
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.results.len(), 43);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failure_count, 43);
    assert!(summary.mean_latency_seconds.is_none());
    assert!(summary.grade().is_none());

    let registry = ReferenceRegistry::load(Path::new(&refs));
    let rows = leaderboard::build(&summary, &registry);
    assert_eq!(rows.len(), 1);
    assert!(leaderboard::local_row(&rows).is_none());

    let html = export(dir.path(), &summary, &registry);
    assert!(html.contains("No successful measurement in this run"));
    assert!(!html.contains("<tr class=\"local\">"));
}

#[tokio::test]
async fn test_cancel_after_ten_tests_exports_partial_scorecard() {
    let server = start_mock(MockServerConfig {
        latency_ms: 200,
        ..Default::default()
    })
    .await;

    let runner = BenchmarkRunner::new().unwrap();
    let mut handle = runner.start(run_config(&server.url())).unwrap();

    let mut finished = 0;
    while let Some(event) = handle.next_event().await {
        if let ProgressEvent::TestFinished { .. } = event {
            finished += 1;
            if finished == 10 {
                handle.cancel();
            }
        }
    }
    let summary = handle.wait().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.completed(), 10);
    assert_eq!(summary.results.len(), 10);
    assert!(server.request_count() <= 11);
    assert_eq!(runner.state(), RunState::Cancelled);

    let dir = tempfile::tempdir().unwrap();
    let html = export(dir.path(), &summary, &ReferenceRegistry::empty());
    assert!(html.contains("Run cancelled after 10/43 tests"));
}

#[tokio::test]
async fn test_missing_reference_file_leaves_only_local_row() {
    let server = start_mock(MockServerConfig {
        latency_ms: 0,
        ..Default::default()
    })
    .await;

    let runner = BenchmarkRunner::new().unwrap();
    let summary = runner
        .start(run_config(&server.url()))
        .unwrap()
        .wait()
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let registry = ReferenceRegistry::load_first(&reference::candidate_paths(Some(
        missing.to_str().unwrap(),
    )));
    assert!(registry.is_empty());

    let rows = leaderboard::build(&summary, &registry);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_local);
    assert_eq!(rows[0].rank, 1);
}

#[tokio::test]
async fn test_saved_summary_reexports_identically() {
    let server = start_mock(MockServerConfig {
        latency_ms: 0,
        fail_every: 5,
        ..Default::default()
    })
    .await;

    let runner = BenchmarkRunner::new().unwrap();
    let summary = runner
        .start(run_config(&server.url()))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.failure_count, 8);

    let json = scorecard::to_json(&summary).unwrap();
    let restored: RunSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.run_id, summary.run_id);
    assert_eq!(restored.results.len(), 43);
    assert_eq!(restored.success_count, 35);
    assert_eq!(restored.started_at, summary.started_at);

    let registry = ReferenceRegistry::parse(r#"[{"name":"Ref","avg_seconds":1.0}]"#);
    let generated_at = chrono::Utc::now();
    let original = scorecard::render_at(
        &summary,
        &leaderboard::build(&summary, &registry),
        generated_at,
    );
    let reexported = scorecard::render_at(
        &restored,
        &leaderboard::build(&restored, &registry),
        generated_at,
    );
    assert_eq!(original, reexported);
}

#[tokio::test]
async fn test_invalid_endpoint_is_rejected_before_any_test() {
    let runner = BenchmarkRunner::new().unwrap();
    assert!(runner.start(run_config("")).is_err());
    assert!(runner.start(run_config("gopher://moth")).is_err());
    assert_eq!(runner.state(), RunState::Idle);
}
