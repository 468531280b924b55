//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http layers: body limit, request id)
//!     → pipeline.rs (ordered stages, then dispatch: handlers.rs or writer)
//!     → contract.rs (structured bodies are JSON objects)
//!     → response.rs (environment origin rewriting)
//!     → Send to client
//! ```

pub mod context;
pub mod contract;
pub mod handlers;
pub mod pipeline;
pub mod response;
pub mod server;

/// Correlation header assigned at the edge and forwarded to the writer.
pub const X_REQUEST_ID: &str = "x-request-id";

pub use context::{Admission, RequestContext, RouteKind};
pub use contract::{error_response, ApiJson, LocalJsonGuard};
pub use pipeline::{DispatchLimits, Flow, Pipeline, ResponseStage, Stage};
pub use server::{AppState, FrontDoor, ServerParts};
