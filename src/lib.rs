//! Identity-verification front door.
//!
//! An HTTP entry point that gates traffic on storage health, sheds load on
//! runtime lag, applies uniform security and response-contract rules, sends
//! write requests to a dedicated writer node and shuts down in order.

pub mod config;
pub mod health;
pub mod http;
pub mod i18n;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod services;
pub mod writer;

pub use config::FrontdoorConfig;
pub use http::FrontDoor;
pub use lifecycle::{launch, Shutdown};
