//! Primary-IdP liveness relay.

use std::time::Duration;

use serde_json::Value;

mod common;

#[tokio::test]
async fn relays_domain_to_writer() {
    let writer = common::MockWriter::start().await;
    let log = common::call_log();
    let running = common::start(common::config(&writer.url()), common::recording(&log)).await;

    running.liveness.observed_online("example.com");

    assert!(common::eventually(Duration::from_secs(2), || writer.requests().len() == 1).await);
    let seen = &writer.requests()[0];
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.path_and_query, "/wsapi/idp_seen");
    let body: Value = serde_json::from_slice(&seen.body).unwrap();
    assert_eq!(body, serde_json::json!({"domain": "example.com"}));

    let stats = running.liveness.stats();
    assert!(common::eventually(Duration::from_secs(1), || stats.delivered() == 1).await);

    running.shutdown.trigger();
}

#[tokio::test]
async fn writer_outage_is_swallowed() {
    let down = common::unused_addr().await;
    let log = common::call_log();
    let running = common::start(
        common::config(&format!("http://{down}")),
        common::recording(&log),
    )
    .await;

    running.liveness.observed_online("a.example");
    running.liveness.observed_online("b.example");

    let stats = running.liveness.stats();
    assert!(common::eventually(Duration::from_secs(3), || stats.failed() == 2).await);
    assert_eq!(stats.delivered(), 0);

    // Still serving.
    let res = common::client()
        .get(running.url("/__heartbeat__"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    running.shutdown.trigger();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn writer_error_status_counts_as_failure() {
    let writer = common::MockWriter::start().await;
    writer.respond_with(500);
    let log = common::call_log();
    let running = common::start(common::config(&writer.url()), common::recording(&log)).await;

    running.liveness.observed_online("example.org");

    let stats = running.liveness.stats();
    assert!(common::eventually(Duration::from_secs(2), || stats.failed() == 1).await);

    running.shutdown.trigger();
}
