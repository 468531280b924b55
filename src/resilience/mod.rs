//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Background:
//!     admission.rs sampler → runtime lag estimate (atomic)
//!
//! Request path:
//!     → admission.rs (lag over threshold? shed with 503)
//! ```
//!
//! # Design Decisions
//! - Shed early: admission runs before any expensive work
//! - Timeouts are non-negotiable; every external call has a deadline
//!   (see `writer::client`, `health::gate`, `services`)

pub mod admission;

pub use admission::AdmissionController;
