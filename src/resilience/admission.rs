//! Load shedding on runtime lag.
//!
//! # Responsibilities
//! - Sample how late the runtime wakes a sleeping task (scheduling lag)
//! - Reject new non-probe requests with 503 while lag exceeds the threshold
//!
//! # State
//! ```text
//! sampler: sleep(interval) → lag = overshoot → window mean → lag_micros
//! request: lag_micros > threshold ? 503 : continue
//! ```
//!
//! # Design Decisions
//! - The request path only does one relaxed atomic load
//! - The sampler holds a `Weak` reference, so dropping the controller ends it
//! - Shutdown stops the sampler explicitly; after that the last estimate stays

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tokio::task::JoinHandle;

use crate::config::AdmissionConfig;
use crate::http::context::{Admission, RequestContext, RouteKind};
use crate::http::contract::error_response;
use crate::http::pipeline::{Flow, Stage};
use crate::observability::metrics;

/// Lag-based admission control.
pub struct AdmissionController {
    enabled: bool,
    threshold: Duration,
    interval: Duration,
    window: usize,
    lag_micros: AtomicU64,
    samples: Mutex<VecDeque<u64>>,
    evaluated: AtomicU64,
    rejected: AtomicU64,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl AdmissionController {
    pub fn new(config: &AdmissionConfig) -> Arc<Self> {
        Arc::new(Self {
            enabled: config.enabled,
            threshold: Duration::from_millis(config.max_lag_ms),
            interval: Duration::from_millis(config.sample_interval_ms.max(1)),
            window: config.smoothing_window.max(1) as usize,
            lag_micros: AtomicU64::new(0),
            samples: Mutex::new(VecDeque::new()),
            evaluated: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            sampler: Mutex::new(None),
        })
    }

    /// Spawn the background lag sampler. No-op when disabled or running.
    pub fn start_sampler(self: &Arc<Self>) {
        if !self.enabled {
            return;
        }
        let mut slot = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.interval;
        *slot = Some(tokio::spawn(async move {
            loop {
                let started = Instant::now();
                tokio::time::sleep(interval).await;
                let lag = started.elapsed().saturating_sub(interval);

                let Some(controller) = weak.upgrade() else { break };
                controller.observe(lag);
            }
        }));
        tracing::debug!(interval = ?self.interval, threshold = ?self.threshold, "Admission sampler started");
    }

    /// Stop the sampler task. Idempotent.
    pub fn stop_sampler(&self) {
        let handle = self
            .sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Admission sampler stopped");
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Feed one lag sample into the smoothing window.
    pub fn observe(&self, lag: Duration) {
        let micros = u64::try_from(lag.as_micros()).unwrap_or(u64::MAX);
        let mean = {
            let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
            samples.push_back(micros);
            while samples.len() > self.window {
                samples.pop_front();
            }
            samples.iter().sum::<u64>() / samples.len() as u64
        };
        self.lag_micros.store(mean, Ordering::Relaxed);
        metrics::record_lag(Duration::from_micros(mean));
    }

    /// Current smoothed lag estimate.
    pub fn lag(&self) -> Duration {
        Duration::from_micros(self.lag_micros.load(Ordering::Relaxed))
    }

    pub fn is_overloaded(&self) -> bool {
        self.enabled && self.lag() > self.threshold
    }

    /// Requests that went through an admission decision.
    pub fn evaluated(&self) -> u64 {
        self.evaluated.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl Drop for AdmissionController {
    fn drop(&mut self) {
        self.stop_sampler();
    }
}

#[async_trait]
impl Stage for AdmissionController {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn on_request(&self, ctx: &mut RequestContext, _request: &mut Request<Body>) -> Flow {
        if !self.enabled || ctx.route == RouteKind::Probe {
            ctx.admission = Admission::Exempt;
            return Flow::Continue;
        }
        self.evaluated.fetch_add(1, Ordering::Relaxed);

        if self.is_overloaded() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            ctx.admission = Admission::Rejected;
            metrics::record_shed();
            tracing::warn!(
                request_id = %ctx.request_id,
                lag_ms = self.lag().as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                "Server too busy, shedding request"
            );
            return Flow::Respond(error_response(StatusCode::SERVICE_UNAVAILABLE));
        }

        ctx.admission = Admission::Admitted;
        Flow::Continue
    }
}
