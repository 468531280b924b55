//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the stage pipeline in its fixed order
//! - Wire up tower-http layers (body limit, request ID)
//! - Mount local handlers behind the pipeline
//! - Serve with graceful, deadline-bounded draining
//!
//! # Layer Order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId
//!     → pipeline: health gate → admission → access log → localization
//!                 → security headers → dispatch (deadline, declared length)
//!                 → local json guard → environment rewriter
//!     → RequestBodyLimit → local handlers
//! ```
//!
//! # Connection Lifecycle
//! Every accepted connection runs in a task owned by a `JoinSet`. Draining
//! stops the accept loop, asks each connection to finish its in-flight
//! request, and aborts whatever is still running at the drain deadline, so
//! no request outlives the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ConnectInfo,
    http::{HeaderName, Request},
    middleware, Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as ConnBuilder,
    service::TowerToHyperService,
};
use tokio::{net::TcpListener, task::JoinSet};
use tower::ServiceExt;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};

use crate::config::FrontdoorConfig;
use crate::health::HealthGate;
use crate::http::contract::LocalJsonGuard;
use crate::http::handlers;
use crate::http::pipeline::{run_pipeline, DispatchLimits, Dispatcher, Pipeline};
use crate::http::response::EnvironmentRewriter;
use crate::http::X_REQUEST_ID;
use crate::i18n::Localization;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::AccessLog;
use crate::resilience::AdmissionController;
use crate::routing::WriteClassifier;
use crate::security::{SecurityHeaderError, SecurityHeaders};
use crate::services::Storage;
use crate::writer::{LivenessSender, WriteForwarder, WriterClient};

/// Application state injected into local handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FrontdoorConfig>,
    /// Hand-off point for "primary IdP observed online" events.
    pub liveness: LivenessSender,
}

/// Shared collaborators the server is built from.
pub struct ServerParts {
    pub storage: Arc<dyn Storage>,
    pub admission: Arc<AdmissionController>,
    pub writer: WriterClient,
    pub liveness: LivenessSender,
}

/// The assembled HTTP front door.
pub struct FrontDoor {
    router: Router,
    pipeline: Arc<Pipeline>,
    access_log: Arc<AccessLog>,
    drain_timeout: Duration,
}

impl FrontDoor {
    pub fn new(
        config: Arc<FrontdoorConfig>,
        parts: ServerParts,
        local: Router<AppState>,
    ) -> Result<Self, SecurityHeaderError> {
        let security = SecurityHeaders::from_config(&config.security)?;
        let access_log = Arc::new(AccessLog::new());

        let dispatcher = Dispatcher::new(
            WriteClassifier::from_config(&config.writer.routes),
            WriteForwarder::new(parts.writer, config.security.max_body_size),
            DispatchLimits {
                timeout: Duration::from_secs(config.timeouts.request_secs),
                max_body: config.security.max_body_size,
            },
        );
        let pipeline = Arc::new(
            Pipeline::builder(dispatcher)
                .stage(Arc::new(HealthGate::new(&config.health, parts.storage)))
                .stage(parts.admission)
                .stage(access_log.clone())
                .stage(Arc::new(Localization::new(&config.i18n)))
                .stage(Arc::new(security))
                .outbound(Arc::new(LocalJsonGuard::new(config.environment.max_rewrite_bytes)))
                .outbound(Arc::new(EnvironmentRewriter::new(&config.environment)))
                .build(),
        );

        let state = AppState {
            config: config.clone(),
            liveness: parts.liveness,
        };
        let router = Self::build_router(&config, pipeline.clone(), local, state);

        Ok(Self {
            router,
            pipeline,
            access_log,
            drain_timeout: Duration::from_secs(config.shutdown.drain_timeout_secs),
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The body limit sits beneath the pipeline so a streamed body that
    /// overruns it fails inside a handler, and the answer still unwinds
    /// through the stages.
    fn build_router(
        config: &FrontdoorConfig,
        pipeline: Arc<Pipeline>,
        local: Router<AppState>,
        state: AppState,
    ) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        local
            .fallback(handlers::not_found)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .with_state(state)
            .layer(middleware::from_fn_with_state(pipeline, run_pipeline))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The complete service, for in-process use and tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    pub fn access_log(&self) -> Arc<AccessLog> {
        self.access_log.clone()
    }

    /// Serve until `shutdown` is triggered, then drain in-flight requests.
    ///
    /// Connections still open at the drain deadline are aborted before this
    /// returns.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            stages = ?self.pipeline.stage_names(),
            "HTTP server starting"
        );

        let mut connections = JoinSet::new();
        let draining = shutdown.draining();
        tokio::pin!(draining);

        loop {
            tokio::select! {
                biased;

                () = &mut draining => break,

                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        self.router.clone(),
                        stream,
                        remote,
                        shutdown.clone(),
                    ));
                }

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(in_flight = connections.len(), "Draining connections");

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                timeout = ?self.drain_timeout,
                remaining = connections.len(),
                "Drain deadline reached, aborting remaining connections"
            );
            connections.shutdown().await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve one connection, finishing gracefully once draining starts.
async fn serve_connection(router: Router, stream: tokio::net::TcpStream, remote: SocketAddr, shutdown: Shutdown) {
    let service = router.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(remote));
        request
    });

    let builder = ConnBuilder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        () = shutdown.draining() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(peer = %remote, error = %e, "Connection closed with error");
    }
}
