//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Writer endpoint → Open storage → Build server → Bind
//!     → Start admission sampler + liveness notifier
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!     → Crypto pool → Storage → Admission sampler → Terminated
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, release
//! - Shutdown has timeouts: every step is bounded

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Phase, Resources, Shutdown};
pub use startup::{launch, Collaborators, Launched, StartupError};
