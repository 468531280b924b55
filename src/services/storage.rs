//! Storage collaborator.
//!
//! The front door only needs three things from storage: open it at boot,
//! ping it from health probes, and close it during shutdown. Query logic
//! lives behind this interface and is not part of this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::{StorageConfig, StorageDriver};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage at {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage at {0} did not answer within {1:?}")]
    Timeout(String, Duration),
    #[error("storage is not open")]
    NotOpen,
    #[error("storage is closed")]
    Closed,
}

/// Storage handle shared process-wide.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Establish the connection. Failure at boot is fatal.
    async fn open(&self) -> Result<(), StorageError>;

    /// Cheap liveness check used by health probes.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Release the handle. Later pings fail with [`StorageError::Closed`].
    async fn close(&self) -> Result<(), StorageError>;
}

/// Build the configured driver (not yet opened).
pub fn from_config(config: &StorageConfig) -> Arc<dyn Storage> {
    match config.driver {
        StorageDriver::Memory => Arc::new(MemoryStorage::default()),
        StorageDriver::Tcp => Arc::new(TcpStorage::new(
            config.address.clone(),
            Duration::from_millis(config.connect_timeout_ms),
        )),
    }
}

#[derive(Debug, Default)]
struct HandleState {
    open: AtomicBool,
    closed: AtomicBool,
}

impl HandleState {
    fn check(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StorageError::Closed)
        } else if !self.open.load(Ordering::Acquire) {
            Err(StorageError::NotOpen)
        } else {
            Ok(())
        }
    }
}

/// In-process storage, always reachable while open.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: HandleState,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn open(&self) -> Result<(), StorageError> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        self.state.open.store(true, Ordering::Release);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.state.check()
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.state.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Storage server reached over TCP; reachability is checked by connecting.
#[derive(Debug)]
pub struct TcpStorage {
    address: String,
    connect_timeout: Duration,
    state: HandleState,
}

impl TcpStorage {
    pub fn new(address: String, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
            state: HandleState::default(),
        }
    }

    async fn connect(&self) -> Result<(), StorageError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(StorageError::Unreachable {
                address: self.address.clone(),
                source,
            }),
            Err(_) => Err(StorageError::Timeout(self.address.clone(), self.connect_timeout)),
        }
    }
}

#[async_trait]
impl Storage for TcpStorage {
    async fn open(&self) -> Result<(), StorageError> {
        self.connect().await?;
        self.state.open.store(true, Ordering::Release);
        tracing::debug!(address = %self.address, "Storage opened");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.state.check()?;
        self.connect().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.state.closed.store(true, Ordering::Release);
        Ok(())
    }
}
