//! Per-request access logging and request metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};

use crate::http::context::RequestContext;
use crate::http::pipeline::{Flow, Stage};
use crate::observability::metrics;

/// Logs one line per request once its response is known.
#[derive(Debug, Default)]
pub struct AccessLog {
    logged: AtomicU64,
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests logged so far.
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    async fn on_request(&self, ctx: &mut RequestContext, _request: &mut Request<Body>) -> Flow {
        tracing::trace!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            "Request received"
        );
        Flow::Continue
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        self.logged.fetch_add(1, Ordering::Relaxed);
        let status = response.status();
        let duration_ms = ctx.elapsed().as_millis() as u64;
        let route = ctx.route.as_str();

        metrics::record_request(ctx.method.as_str(), status.as_u16(), route, ctx.started);

        if status.is_server_error() {
            tracing::warn!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                status = status.as_u16(),
                route,
                duration_ms,
                "Request failed"
            );
        } else {
            tracing::info!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                status = status.as_u16(),
                route,
                duration_ms,
                "Request completed"
            );
        }
    }
}
