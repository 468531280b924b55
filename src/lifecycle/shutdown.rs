//! Shutdown coordination for the front door.
//!
//! # State
//! ```text
//! Running ──trigger──▶ Draining ──release──▶ Terminated
//! ```
//!
//! Transitions are one-way. `release` runs its steps exactly once, in order,
//! and each step runs even if an earlier one failed:
//!
//! 1. crypto worker pool (drain outstanding hashes, refuse new ones)
//! 2. storage handle
//! 3. admission sampler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::resilience::AdmissionController;
use crate::services::{CryptoPool, Storage};

/// Process lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Terminated,
}

/// Process-wide resources released during shutdown.
#[derive(Clone)]
pub struct Resources {
    pub crypto: Arc<dyn CryptoPool>,
    pub storage: Arc<dyn Storage>,
    pub admission: Arc<AdmissionController>,
}

/// Coordinator for graceful shutdown.
///
/// Cloning shares the same token; every clone observes the same phase.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Phase>>,
    released: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Running);
        Self {
            tx: Arc::new(tx),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Move from Running to Draining. Returns false if already past Running.
    pub fn trigger(&self) -> bool {
        let moved = self.tx.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!("Shutdown triggered, draining connections");
        }
        moved
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Observe phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Resolves once the phase leaves Running.
    pub async fn draining(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|phase| *phase != Phase::Running).await;
    }

    /// Release every resource once, then enter Terminated.
    pub async fn release(&self, resources: &Resources, step_timeout: Duration) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.trigger();

        match tokio::time::timeout(step_timeout, resources.crypto.shutdown()).await {
            Ok(Ok(())) => tracing::info!("Crypto pool shut down"),
            Ok(Err(e)) => tracing::error!(error = %e, "Crypto pool shutdown failed"),
            Err(_) => tracing::error!(timeout = ?step_timeout, "Crypto pool shutdown timed out"),
        }

        match tokio::time::timeout(step_timeout, resources.storage.close()).await {
            Ok(Ok(())) => tracing::info!("Storage closed"),
            Ok(Err(e)) => tracing::error!(error = %e, "Storage close failed"),
            Err(_) => tracing::error!(timeout = ?step_timeout, "Storage close timed out"),
        }

        resources.admission.stop_sampler();

        self.tx.send_replace(Phase::Terminated);
        tracing::info!("Shutdown complete");
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
