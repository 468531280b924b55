//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;

use frontdoor::config::FrontdoorConfig;
use frontdoor::http::{handlers, AppState};
use frontdoor::lifecycle::{launch, Collaborators, Launched};
use frontdoor::services::{CryptoError, CryptoPool, Storage, StorageError};

/// One request as the mock writer saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
struct WriterState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
}

/// Writer node double: records every request, answers with a set status.
pub struct MockWriter {
    pub addr: SocketAddr,
    state: WriterState,
}

impl MockWriter {
    pub async fn start() -> Self {
        let state = WriterState {
            requests: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(AtomicU16::new(200)),
            delay_ms: Arc::new(AtomicU64::new(0)),
        };
        let app = Router::new().fallback(record).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        self.state.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

async fn record(
    State(state): State<WriterState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    state.requests.lock().unwrap().push(Recorded {
        method,
        path_and_query,
        headers,
        body,
    });

    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap();
    (
        status,
        [("content-type", "application/json")],
        format!(r#"{{"success":{},"source":"writer"}}"#, status.is_success()),
    )
}

/// Shared journal of collaborator calls, in call order.
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn count(log: &CallLog, call: &str) -> usize {
    log.lock().unwrap().iter().filter(|c| **c == call).count()
}

/// Storage double that journals calls; `open` can be made to fail.
pub struct RecordingStorage {
    pub log: CallLog,
    pub fail_open: bool,
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn open(&self) -> Result<(), StorageError> {
        self.log.lock().unwrap().push("storage.open");
        if self.fail_open {
            Err(StorageError::NotOpen)
        } else {
            Ok(())
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.log.lock().unwrap().push("storage.close");
        Ok(())
    }
}

/// Crypto double that journals shutdown calls.
pub struct RecordingCrypto {
    pub log: CallLog,
}

#[async_trait]
impl CryptoPool for RecordingCrypto {
    async fn encrypt(&self, _work_factor: u32, input: &str) -> Result<String, CryptoError> {
        Ok(format!("hashed:{input}"))
    }

    async fn shutdown(&self) -> Result<(), CryptoError> {
        self.log.lock().unwrap().push("crypto.shutdown");
        Ok(())
    }
}

pub fn recording(log: &CallLog) -> Collaborators {
    Collaborators {
        storage: Arc::new(RecordingStorage {
            log: log.clone(),
            fail_open: false,
        }),
        crypto: Arc::new(RecordingCrypto { log: log.clone() }),
    }
}

/// Config bound to an ephemeral local port and pointed at `writer_url`.
pub fn config(writer_url: &str) -> FrontdoorConfig {
    let mut config = FrontdoorConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.writer.url = writer_url.to_string();
    config.writer.timeout_secs = 2;
    // Keep shedding out of the way of ordinary tests.
    config.admission.max_lag_ms = 5_000;
    config.shutdown.drain_timeout_secs = 5;
    config.shutdown.step_timeout_secs = 2;
    config
}

/// A running front door.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: frontdoor::Shutdown,
    pub liveness: frontdoor::writer::LivenessSender,
    pub task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start(config: FrontdoorConfig, collaborators: Collaborators) -> Running {
    start_with(config, collaborators, handlers::local_router()).await
}

pub async fn start_with(
    config: FrontdoorConfig,
    collaborators: Collaborators,
    local: Router<AppState>,
) -> Running {
    let launched: Launched = launch(config, collaborators, local).await.unwrap();
    let addr = launched.local_addr();
    let shutdown = launched.shutdown();
    let liveness = launched.liveness();
    let task = tokio::spawn(launched.serve());
    Running {
        addr,
        shutdown,
        liveness,
        task,
    }
}

/// Client that never pools connections or uses a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A local address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
