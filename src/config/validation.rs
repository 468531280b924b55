//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the writer URL and write routes
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that configured header values are sendable
//!
//! Returns all validation errors, not just the first.

use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::FrontdoorConfig;
use crate::security::headers::SecurityHeaders;
use crate::writer::endpoint::{WriterEndpoint, WriterUrlError};

/// A single semantic problem in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("writer.url: {0}")]
    WriterUrl(#[from] WriterUrlError),
    #[error("{field}: invalid socket address {value:?}")]
    Address { field: &'static str, value: String },
    #[error("{field}: path {value:?} must start with '/'")]
    Path { field: &'static str, value: String },
    #[error("writer.routes: invalid method {0:?}")]
    Method(String),
    #[error("writer.routes: route {0:?} lists no methods")]
    NoMethods(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("i18n.supported_locales must not be empty")]
    NoLocales,
    #[error("i18n.default_locale {0:?} is not a supported locale")]
    DefaultLocale(String),
    #[error("crypto.work_factor {0} is outside 4..=31")]
    WorkFactor(u32),
    #[error("environment.url_substitutions: empty 'from' origin")]
    EmptySubstitution,
    #[error("security: {0}")]
    HeaderValue(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FrontdoorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Err(e) = WriterEndpoint::parse(&config.writer.url) {
        errors.push(e.into());
    }
    if !config.writer.liveness_path.starts_with('/') {
        errors.push(ValidationError::Path {
            field: "writer.liveness_path",
            value: config.writer.liveness_path.clone(),
        });
    }
    for route in &config.writer.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::Path {
                field: "writer.routes",
                value: route.path_prefix.clone(),
            });
        }
        if route.methods.is_empty() {
            errors.push(ValidationError::NoMethods(route.path_prefix.clone()));
        }
        for method in &route.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::Method(method.clone()));
            }
        }
    }

    for path in &config.health.paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::Path {
                field: "health.paths",
                value: path.clone(),
            });
        }
    }

    let positive = [
        (config.timeouts.request_secs == 0, "timeouts.request_secs"),
        (config.writer.timeout_secs == 0, "writer.timeout_secs"),
        (config.writer.liveness_queue == 0, "writer.liveness_queue"),
        (config.health.timeout_ms == 0, "health.timeout_ms"),
        (config.admission.sample_interval_ms == 0, "admission.sample_interval_ms"),
        (config.admission.smoothing_window == 0, "admission.smoothing_window"),
        (config.crypto.workers == 0, "crypto.workers"),
        (config.security.max_body_size == 0, "security.max_body_size"),
    ];
    for (is_zero, field) in positive {
        if is_zero {
            errors.push(ValidationError::Zero(field));
        }
    }

    if !(4..=31).contains(&config.crypto.work_factor) {
        errors.push(ValidationError::WorkFactor(config.crypto.work_factor));
    }

    if config.i18n.supported_locales.is_empty() {
        errors.push(ValidationError::NoLocales);
    } else if !config
        .i18n
        .supported_locales
        .iter()
        .any(|l| l.eq_ignore_ascii_case(&config.i18n.default_locale))
    {
        errors.push(ValidationError::DefaultLocale(config.i18n.default_locale.clone()));
    }

    if config
        .environment
        .url_substitutions
        .iter()
        .any(|s| s.from.is_empty())
    {
        errors.push(ValidationError::EmptySubstitution);
    }

    if let Err(e) = SecurityHeaders::from_config(&config.security) {
        errors.push(ValidationError::HeaderValue(e.to_string()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
