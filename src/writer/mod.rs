//! Writer node integration.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     writer.url → endpoint.rs (validate, reduce to origin) → WriterClient
//!
//! Request path:
//!     write-classified request → forwarder.rs → client.rs → writer node
//!
//! Background:
//!     LivenessSender → notifier.rs (queue, single consumer) → client.rs → writer node
//! ```

pub mod client;
pub mod endpoint;
pub mod forwarder;
pub mod notifier;

pub use client::{ForwardError, WriterClient, WriterResponse};
pub use endpoint::{WriterEndpoint, WriterUrlError};
pub use forwarder::WriteForwarder;
pub use notifier::{LivenessEvent, LivenessNotifier, LivenessSender, NotifierStats, RelayError};
