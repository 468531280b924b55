//! Graceful shutdown ordering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use frontdoor::http::AppState;
use frontdoor::lifecycle::Phase;
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn drains_then_releases_in_order() {
    let writer = common::MockWriter::start().await;
    let log = common::call_log();

    let entered = Arc::new(AtomicUsize::new(0));
    let seen = entered.clone();
    let local: Router<AppState> = Router::new().route(
        "/slow",
        get(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "done"
            }
        }),
    );

    let running = common::start_with(common::config(&writer.url()), common::recording(&log), local).await;
    let addr = running.addr;

    let in_flight = {
        let url = running.url("/slow");
        tokio::spawn(async move { common::client().get(url).send().await })
    };
    assert!(common::eventually(Duration::from_secs(2), || entered.load(Ordering::SeqCst) == 1).await);

    assert!(running.shutdown.trigger());

    // The in-flight request completes.
    let res = in_flight.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done");

    // New connections are refused once draining started.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());

    running.task.await.unwrap().unwrap();
    assert_eq!(running.shutdown.phase(), Phase::Terminated);

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls, vec!["storage.open", "crypto.shutdown", "storage.close"]);
    assert_eq!(common::count(&log, "crypto.shutdown"), 1);
    assert_eq!(common::count(&log, "storage.close"), 1);
}

#[tokio::test]
async fn repeated_triggers_release_once() {
    let writer = common::MockWriter::start().await;
    let log = common::call_log();
    let running = common::start(common::config(&writer.url()), common::recording(&log)).await;

    assert!(running.shutdown.trigger());
    assert!(!running.shutdown.trigger());
    running.task.await.unwrap().unwrap();
    assert!(!running.shutdown.trigger());

    assert_eq!(common::count(&log, "crypto.shutdown"), 1);
    assert_eq!(common::count(&log, "storage.close"), 1);
}

#[tokio::test]
async fn drain_deadline_bounds_shutdown() {
    let writer = common::MockWriter::start().await;
    let log = common::call_log();
    let entered = Arc::new(AtomicUsize::new(0));
    let seen = entered.clone();
    let local: Router<AppState> = Router::new().route(
        "/stuck",
        get(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "never"
            }
        }),
    );
    let mut config = common::config(&writer.url());
    config.shutdown.drain_timeout_secs = 1;
    config.timeouts.request_secs = 60;
    let running = common::start_with(config, common::recording(&log), local).await;

    let url = running.url("/stuck");
    let stuck = tokio::spawn(async move { common::client().get(url).send().await });
    assert!(common::eventually(Duration::from_secs(2), || entered.load(Ordering::SeqCst) == 1).await);

    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("shutdown did not respect the drain deadline")
        .unwrap()
        .unwrap();

    assert_eq!(common::count(&log, "storage.close"), 1);

    // The connection was aborted at the deadline, so the request cannot
    // complete against released resources.
    let outcome = tokio::time::timeout(Duration::from_secs(2), stuck)
        .await
        .expect("stuck request still running after shutdown")
        .unwrap();
    assert!(outcome.is_err());
}
