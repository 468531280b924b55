//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → RequestBodyLimitLayer (max_body_size, see http::server)
//!     → Pass to pipeline
//!
//! Every response a request saw the stage for:
//!     → headers.rs (HSTS, framing, CSP, nosniff, referrer policy)
//! ```
//!
//! # Design Decisions
//! - Policy headers are uniform: local and forwarded responses alike
//! - Invalid header configuration fails startup

pub mod headers;

pub use headers::{SecurityHeaderError, SecurityHeaders};
