//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and the writer endpoint
//! - Open storage and build every subsystem in dependency order
//! - Bind the listener last, then start background tasks
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and happens before binding
//! - Resources acquired before a later failure are released again
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{validate_config, ConfigError, FrontdoorConfig};
use crate::http::server::{AppState, FrontDoor, ServerParts};
use crate::lifecycle::shutdown::{Resources, Shutdown};
use crate::resilience::AdmissionController;
use crate::security::SecurityHeaderError;
use crate::services::{CryptoPool, Storage, StorageError};
use crate::writer::{notifier, LivenessNotifier, LivenessSender, WriterClient, WriterEndpoint, WriterUrlError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid writer URL: {0}")]
    Writer(#[from] WriterUrlError),
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Headers(#[from] SecurityHeaderError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Externally provided collaborators (not yet opened).
pub struct Collaborators {
    pub storage: Arc<dyn Storage>,
    pub crypto: Arc<dyn CryptoPool>,
}

/// A bound, ready-to-serve front door.
pub struct Launched {
    server: FrontDoor,
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: Shutdown,
    resources: Resources,
    liveness: LivenessSender,
    step_timeout: Duration,
}

impl Launched {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shutdown token; `trigger()` starts draining.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn liveness(&self) -> LivenessSender {
        self.liveness.clone()
    }

    /// Serve until shutdown, drain, then release resources in order.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let result = self.server.run(self.listener, self.shutdown.clone()).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "HTTP server failed");
        }
        self.shutdown.release(&self.resources, self.step_timeout).await;
        result
    }
}

/// Build and bind everything `config` describes.
pub async fn launch(
    config: FrontdoorConfig,
    collaborators: Collaborators,
    local: Router<AppState>,
) -> Result<Launched, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    let endpoint = WriterEndpoint::parse(&config.writer.url)?;
    tracing::info!(writer = %endpoint, environment = %config.environment.tag, "Configuration loaded");

    collaborators.storage.open().await?;
    tracing::info!(driver = ?config.storage.driver, "Storage opened");

    let config = Arc::new(config);
    let shutdown = Shutdown::new();
    let admission = AdmissionController::new(&config.admission);
    let resources = Resources {
        crypto: collaborators.crypto,
        storage: collaborators.storage.clone(),
        admission: admission.clone(),
    };
    let step_timeout = Duration::from_secs(config.shutdown.step_timeout_secs);

    let writer = WriterClient::new(
        endpoint,
        Duration::from_secs(config.writer.timeout_secs),
        config.security.max_body_size,
    );
    let (liveness, notifier) = notifier::channel(&config.writer, writer.clone());

    let parts = ServerParts {
        storage: collaborators.storage,
        admission: admission.clone(),
        writer,
        liveness: liveness.clone(),
    };
    let server = match FrontDoor::new(config.clone(), parts, local) {
        Ok(server) => server,
        Err(e) => {
            shutdown.release(&resources, step_timeout).await;
            return Err(e.into());
        }
    };

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(source) => {
            shutdown.release(&resources, step_timeout).await;
            return Err(StartupError::Bind {
                address: config.listener.bind_address.clone(),
                source,
            });
        }
    };
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;

    admission.start_sampler();
    spawn_notifier(notifier, &shutdown);
    tracing::info!(address = %local_addr, "Listening for connections");

    Ok(Launched {
        server,
        listener,
        local_addr,
        shutdown,
        resources,
        liveness,
        step_timeout,
    })
}

fn spawn_notifier(notifier: LivenessNotifier, shutdown: &Shutdown) {
    tokio::spawn(notifier.run(shutdown.subscribe()));
}
