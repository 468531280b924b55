//! Crypto worker pool.
//!
//! # Responsibilities
//! - Run password hashing off the request runtime
//! - Bound concurrent hashing to a fixed worker count
//! - Drain outstanding work on shutdown, then refuse new work
//!
//! # Design Decisions
//! - bcrypt runs on `spawn_blocking`; a semaphore permit is held for the
//!   whole computation so shutdown can wait for every permit
//! - A hash either completes and is returned, or is never started; there is
//!   no partially computed credential

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::CryptoConfig;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("crypto pool is shut down")]
    ShutDown,
    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("hashing worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("{0} hash operations still running after {1:?}")]
    DrainTimeout(usize, Duration),
}

/// Bounded pool for expensive credential hashing.
#[async_trait]
pub trait CryptoPool: Send + Sync {
    /// Hash `input` with the given cost.
    async fn encrypt(&self, work_factor: u32, input: &str) -> Result<String, CryptoError>;

    /// Wait for outstanding operations and refuse new ones.
    async fn shutdown(&self) -> Result<(), CryptoError>;
}

/// bcrypt on the blocking thread pool.
#[derive(Debug)]
pub struct BcryptPool {
    permits: Semaphore,
    workers: usize,
    drain_timeout: Duration,
    stopping: AtomicBool,
}

impl BcryptPool {
    pub fn new(config: &CryptoConfig) -> Self {
        let workers = config.workers.max(1);
        Self {
            permits: Semaphore::new(workers),
            workers,
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            stopping: AtomicBool::new(false),
        }
    }

    /// Operations currently holding a worker.
    pub fn in_flight(&self) -> usize {
        self.workers.saturating_sub(self.permits.available_permits())
    }
}

#[async_trait]
impl CryptoPool for BcryptPool {
    async fn encrypt(&self, work_factor: u32, input: &str) -> Result<String, CryptoError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(CryptoError::ShutDown);
        }
        let _permit = self.permits.acquire().await.map_err(|_| CryptoError::ShutDown)?;

        let input = input.to_owned();
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(input, work_factor)).await??;
        Ok(hashed)
    }

    async fn shutdown(&self) -> Result<(), CryptoError> {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let workers = u32::try_from(self.workers).unwrap_or(u32::MAX);
        let drained = tokio::time::timeout(self.drain_timeout, self.permits.acquire_many(workers)).await;
        let outcome = match drained {
            Ok(Ok(permits)) => {
                permits.forget();
                Ok(())
            }
            Ok(Err(_)) => Ok(()),
            Err(_) => Err(CryptoError::DrainTimeout(self.in_flight(), self.drain_timeout)),
        };
        self.permits.close();
        outcome
    }
}
