use super::harness::{enqueue_names, logged_names, queued_names, read_lines, Reply, TestHarness};
use echopost_delivery::DeliveryError;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn success_status_deletes_and_logs_success() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["a"]).await;
    h.remote.queue_replies([Reply::status(201)]);

    let report = h.engine(&ctx).run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.delivered, 1);
    assert!(ctx.queue().is_empty().await.unwrap());
    assert_eq!(logged_names(ctx.logs().success_path()), vec!["a"]);
    assert!(read_lines(ctx.logs().failure_path()).is_empty());
}

#[tokio::test]
async fn not_found_is_permanent_and_logged_with_response() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["a"]).await;
    h.remote
        .queue_replies([Reply::Status(404, "no such pipeline".into())]);

    let report = h.engine(&ctx).run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.rejected, 1);
    assert!(ctx.queue().is_empty().await.unwrap());
    assert!(read_lines(ctx.logs().success_path()).is_empty());

    let failed = read_lines(ctx.logs().failure_path());
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["log_data"]["payload"]["name"], "a");
    assert_eq!(failed[0]["context"]["responseCode"], 404);
    assert_eq!(failed[0]["context"]["response"], "no such pipeline");
}

#[tokio::test]
async fn band_edges_300_and_500_are_permanent() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["a", "b"]).await;
    h.remote
        .queue_replies([Reply::status(300), Reply::status(500)]);

    let report = h.engine(&ctx).run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.rejected, 2);
    assert!(ctx.queue().is_empty().await.unwrap());
    let codes: Vec<u64> = read_lines(ctx.logs().failure_path())
        .iter()
        .map(|l| l["context"]["responseCode"].as_u64().unwrap())
        .collect();
    assert_eq!(codes, vec![300, 500]);
}

#[tokio::test]
async fn status_above_500_keeps_the_entry() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["a"]).await;
    h.remote.queue_replies([Reply::status(501)]);

    let err = h
        .engine(&ctx)
        .run_pass(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::ServerError { status: 501 }));
    assert_eq!(queued_names(ctx.queue()).await, vec!["a"]);
    assert!(read_lines(ctx.logs().success_path()).is_empty());
    assert!(read_lines(ctx.logs().failure_path()).is_empty());
}

#[tokio::test]
async fn transport_failure_stops_the_pass_without_deleting() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["a", "b"]).await;
    h.remote.queue_replies([Reply::Transport]);

    let err = h
        .engine(&ctx)
        .run_pass(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DeliveryError::Transport(_)));
    assert_eq!(h.remote.delivered_names(), vec!["a"]);
    assert_eq!(queued_names(ctx.queue()).await, vec!["a", "b"]);
}

#[tokio::test]
async fn undecodable_entry_is_logged_raw_and_deleted() {
    let h = TestHarness::new();
    let ctx = h.context().await;
    enqueue_names(ctx.queue(), &["good"]).await;

    // "0" sorts ahead of every generated key.
    let conn = rusqlite::Connection::open(ctx.queue().db_path()).unwrap();
    conn.execute(
        "INSERT INTO entries (key, value) VALUES ('0', 'not json')",
        [],
    )
    .unwrap();
    drop(conn);

    let report = h.engine(&ctx).run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.delivered, 1);
    assert!(ctx.queue().is_empty().await.unwrap());
    assert_eq!(h.remote.delivered_names(), vec!["good"]);

    let failed = read_lines(ctx.logs().failure_path());
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["log_data"].is_null());
    assert_eq!(failed[0]["context"]["raw"], "not json");
}
