//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe request (configured path)
//!     → gate.rs (first pipeline stage)
//!     → storage ping (bounded)
//!     → 200 {"ok":true} | 503 {"ok":false}
//! ```
//!
//! # Design Decisions
//! - Health state is transient: computed per probe, never cached
//! - Probes never reach admission control, logging or dispatch

pub mod gate;

pub use gate::HealthGate;
