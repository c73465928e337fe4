use echopost_core::LogRecord;
use echopost_delivery::{DeliveryError, HttpRemote, OutcomeLogs, ReplayEngine, API_KEY_HEADER};
use echopost_queue::DurableQueue;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn record(name: &str) -> LogRecord {
    LogRecord::from_producer(&json!({ "name": name }).to_string(), vec!["test-pipeline".into()])
}

fn matches_name(name: &str) -> Matcher {
    Matcher::PartialJson(json!({ "log_data": { "name": name } }))
}

#[tokio::test]
async fn pass_against_http_server_stops_at_first_transient_status() {
    let dir = tempfile::tempdir().unwrap();
    let queue = DurableQueue::open(&dir.path().join("queue/records.sqlite"))
        .await
        .unwrap();
    let logs = Arc::new(OutcomeLogs::open(&dir.path().join("session")).unwrap());

    let mut server = Server::new_async().await;
    let a = server
        .mock("POST", "/log")
        .match_header(API_KEY_HEADER, "k")
        .match_body(matches_name("a"))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let b = server
        .mock("POST", "/log")
        .match_body(matches_name("b"))
        .with_status(404)
        .with_body("unknown pipeline")
        .expect(1)
        .create_async()
        .await;
    let c = server
        .mock("POST", "/log")
        .match_body(matches_name("c"))
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let d = server
        .mock("POST", "/log")
        .match_body(matches_name("d"))
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    for name in ["a", "b", "c", "d"] {
        queue.enqueue(&record(name)).await.unwrap();
    }

    let remote = HttpRemote::new(&server.url(), "k", Duration::from_secs(2)).unwrap();
    let engine = ReplayEngine::new(queue.clone(), Arc::new(remote), logs.clone());

    let err = engine.run_pass(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::ServerError { status: 503 }));

    a.assert_async().await;
    b.assert_async().await;
    c.assert_async().await;
    d.assert_async().await;

    // c and d remain, in order.
    let mut snapshot = queue.iterate().await.unwrap();
    let mut left = Vec::new();
    while let Some(entry) = snapshot.next().await.unwrap() {
        left.push(entry.decode().unwrap().payload["name"].clone());
    }
    assert_eq!(left, vec![json!("c"), json!("d")]);

    let failure = std::fs::read_to_string(logs.failure_path()).unwrap();
    assert!(failure.contains("\"responseCode\":404"));
    assert!(failure.contains("unknown pipeline"));
}

#[tokio::test]
async fn unreachable_server_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let queue = DurableQueue::open(&dir.path().join("q.sqlite")).await.unwrap();
    let logs = Arc::new(OutcomeLogs::open(dir.path()).unwrap());
    queue.enqueue(&record("a")).await.unwrap();

    let remote = HttpRemote::new("http://127.0.0.1:1", "k", Duration::from_secs(1)).unwrap();
    let engine = ReplayEngine::new(queue.clone(), Arc::new(remote), logs);

    let err = engine.run_pass(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport(_)));
    assert_eq!(queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn redirect_on_log_is_a_permanent_failure() {
    let dir = tempfile::tempdir().unwrap();
    let queue = DurableQueue::open(&dir.path().join("q.sqlite")).await.unwrap();
    let logs = Arc::new(OutcomeLogs::open(dir.path()).unwrap());
    queue.enqueue(&record("moved")).await.unwrap();

    let mut server = Server::new_async().await;
    server
        .mock("POST", "/log")
        .with_status(302)
        .with_header("location", "/v2/log")
        .create_async()
        .await;
    let target = server
        .mock("POST", "/v2/log")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let remote = HttpRemote::new(&server.url(), "k", Duration::from_secs(2)).unwrap();
    let engine = ReplayEngine::new(queue.clone(), Arc::new(remote), logs.clone());

    let report = engine.run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.rejected, 1);
    assert_eq!(report.delivered, 0);
    assert!(queue.is_empty().await.unwrap());
    target.assert_async().await;

    let failure = std::fs::read_to_string(logs.failure_path()).unwrap();
    assert!(failure.contains("\"responseCode\":302"));
    assert!(std::fs::read_to_string(logs.success_path()).unwrap().is_empty());
}
