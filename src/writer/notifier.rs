//! Primary-IdP liveness relay.
//!
//! # Data Flow
//! ```text
//! detection subsystem
//!     → LivenessSender::observed_online(domain)   (try_send, never blocks)
//!     → bounded mpsc queue
//!     → LivenessNotifier::run                     (one event at a time)
//!     → POST {writer-origin}{liveness_path} {"domain": D}
//! ```
//!
//! # Design Decisions
//! - At-most-once, best-effort: no retry, no persistence. A missed relay
//!   only delays detection until the provider is seen again
//! - Failures are logged at warn and counted, never returned to the sender
//! - A full queue drops the event rather than applying backpressure to the
//!   request path

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, StatusCode},
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::config::WriterConfig;
use crate::lifecycle::shutdown::Phase;
use crate::observability::metrics;
use crate::writer::client::{ForwardError, WriterClient};

/// Why one liveness relay did not land.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error("writer answered {0}")]
    Status(StatusCode),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),
}

/// "This domain's identity provider was just observed online."
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivenessEvent {
    pub domain: String,
}

/// Handle given to the detection subsystem.
#[derive(Debug, Clone)]
pub struct LivenessSender {
    tx: mpsc::Sender<LivenessEvent>,
    stats: Arc<NotifierStats>,
}

impl LivenessSender {
    /// Record that `domain`'s primary IdP is online. Never fails.
    pub fn observed_online(&self, domain: impl Into<String>) {
        let event = LivenessEvent {
            domain: domain.into(),
        };
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(domain = %event.domain, "Liveness queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(domain = %event.domain, "Liveness notifier stopped, dropping event");
            }
        }
    }

    pub fn stats(&self) -> Arc<NotifierStats> {
        self.stats.clone()
    }
}

/// Relay outcome counters.
#[derive(Debug, Default)]
pub struct NotifierStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl NotifierStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Single consumer of liveness events.
pub struct LivenessNotifier {
    rx: mpsc::Receiver<LivenessEvent>,
    client: WriterClient,
    path: String,
    stats: Arc<NotifierStats>,
}

/// Create the sender/notifier pair.
pub fn channel(config: &WriterConfig, client: WriterClient) -> (LivenessSender, LivenessNotifier) {
    let (tx, rx) = mpsc::channel(config.liveness_queue.max(1));
    let stats = Arc::new(NotifierStats::default());
    (
        LivenessSender {
            tx,
            stats: stats.clone(),
        },
        LivenessNotifier {
            rx,
            client,
            path: config.liveness_path.clone(),
            stats,
        },
    )
}

impl LivenessNotifier {
    /// Relay events until every sender is gone or shutdown begins.
    pub async fn run(mut self, mut phase: watch::Receiver<Phase>) {
        tracing::debug!(writer = %self.client.endpoint(), "Liveness notifier started");
        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.notify(event).await,
                    None => break,
                },
                changed = phase.changed() => {
                    if changed.is_err() || *phase.borrow() != Phase::Running {
                        break;
                    }
                }
            }
        }
        tracing::debug!(
            delivered = self.stats.delivered(),
            failed = self.stats.failed(),
            "Liveness notifier stopped"
        );
    }

    async fn notify(&self, event: LivenessEvent) {
        match self.relay(&event).await {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::record_liveness("delivered");
                tracing::debug!(domain = %event.domain, "Relayed primary IdP liveness");
            }
            Err(error) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_liveness("failed");
                tracing::warn!(domain = %event.domain, %error, "Failed to relay primary IdP liveness");
            }
        }
    }

    async fn relay(&self, event: &LivenessEvent) -> Result<(), RelayError> {
        let body = serde_json::to_vec(event)?;
        let request = self
            .client
            .request_builder(Method::POST, &self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))?;

        let response = self.client.send(request).await?;
        if response.status.is_success() {
            Ok(())
        } else {
            Err(RelayError::Status(response.status))
        }
    }
}
