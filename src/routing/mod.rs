//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     WriteRouteConfig[]
//!     → Compile matchers (path prefix AND method set)
//!     → Freeze as immutable WriteClassifier
//!
//! Incoming Request (method, path)
//!     → classifier.rs (any write route matches?)
//!     → Return: forward to writer, or handle locally
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always classifies the same way

pub mod classifier;
pub mod matcher;

pub use classifier::WriteClassifier;
