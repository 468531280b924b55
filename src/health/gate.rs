//! Health probe handling.
//!
//! # Responsibilities
//! - Answer probe paths before any other stage runs
//! - Ping storage with a bounded timeout on every probe
//!
//! # Design Decisions
//! - Health is computed per probe; nothing is cached
//! - The gate is the first stage, so probes skip admission control and the
//!   access log entirely
//! - A failed or slow ping is logged and reported as 503, never propagated

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;

use crate::config::HealthConfig;
use crate::http::context::{Admission, RequestContext, RouteKind};
use crate::http::contract::ApiJson;
use crate::http::pipeline::{Flow, Stage};
use crate::observability::metrics;
use crate::services::storage::Storage;

#[derive(Debug, Serialize)]
struct Health {
    ok: bool,
}

/// First pipeline stage: answers health probes.
pub struct HealthGate {
    paths: Vec<String>,
    timeout: Duration,
    storage: Arc<dyn Storage>,
}

impl HealthGate {
    pub fn new(config: &HealthConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            paths: config.paths.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            storage,
        }
    }

    pub fn is_probe(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Ping storage once.
    pub async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.storage.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Health check failed: storage ping error");
                false
            }
            Err(_) => {
                tracing::error!(timeout = ?self.timeout, "Health check failed: storage ping timed out");
                false
            }
        }
    }
}

#[async_trait]
impl Stage for HealthGate {
    fn name(&self) -> &'static str {
        "health_gate"
    }

    async fn on_request(&self, ctx: &mut RequestContext, _request: &mut Request<Body>) -> Flow {
        if !self.is_probe(&ctx.path) {
            return Flow::Continue;
        }
        ctx.route = RouteKind::Probe;
        ctx.admission = Admission::Exempt;

        let ok = self.check().await;
        metrics::record_health(ok);
        let status = if ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        Flow::Respond(ApiJson::new(status, Health { ok }).into_response())
    }
}
