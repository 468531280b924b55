//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the front door.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults so a minimal file (or none) works.

use serde::{Deserialize, Serialize};

/// Root configuration for the front door.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FrontdoorConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Writer node and write routes.
    pub writer: WriterConfig,

    /// Security response headers and request limits.
    pub security: SecurityConfig,

    /// Supported locales.
    pub i18n: I18nConfig,

    /// Deployment environment and response URL substitution.
    pub environment: EnvironmentConfig,

    /// Load shedding.
    pub admission: AdmissionConfig,

    /// Health probe settings.
    pub health: HealthConfig,

    /// Storage collaborator.
    pub storage: StorageConfig,

    /// Crypto worker pool.
    pub crypto: CryptoConfig,

    /// Shutdown deadlines.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Writer node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Base URL of the writer node. Only its origin is kept.
    pub url: String,

    /// Timeout for a single forwarded request in seconds.
    pub timeout_secs: u64,

    /// Path on the writer that records a primary IdP as seen online.
    pub liveness_path: String,

    /// Capacity of the liveness event queue.
    pub liveness_queue: usize,

    /// Routes whose matching requests are forwarded to the writer.
    pub routes: Vec<WriteRouteConfig>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:62900".to_string(),
            timeout_secs: 10,
            liveness_path: "/wsapi/idp_seen".to_string(),
            liveness_queue: 64,
            routes: vec![WriteRouteConfig::default()],
        }
    }
}

/// A write route: requests under `path_prefix` using one of `methods`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriteRouteConfig {
    /// Path prefix to match (case-sensitive).
    pub path_prefix: String,

    /// HTTP methods classified as writes on this prefix.
    #[serde(default = "default_write_methods")]
    pub methods: Vec<String>,
}

impl Default for WriteRouteConfig {
    fn default() -> Self {
        Self {
            path_prefix: "/wsapi/".to_string(),
            methods: default_write_methods(),
        }
    }
}

fn default_write_methods() -> Vec<String> {
    vec!["POST".to_string()]
}

/// Frame embedding policy sent as `X-Frame-Options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePolicy {
    Deny,
    SameOrigin,
    Off,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Send `Strict-Transport-Security`.
    pub hsts: bool,
    pub hsts_max_age_secs: u64,
    pub hsts_include_subdomains: bool,
    /// Anti-framing policy.
    pub frame_options: FramePolicy,
    /// `Content-Security-Policy` value; `None` disables the header.
    pub content_security_policy: Option<String>,
    /// `Referrer-Policy` value; `None` disables the header.
    pub referrer_policy: Option<String>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hsts: true,
            hsts_max_age_secs: 10_886_400, // 126 days
            hsts_include_subdomains: true,
            frame_options: FramePolicy::Deny,
            content_security_policy: Some("default-src 'self'; frame-ancestors 'none'".to_string()),
            referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Locale configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Locales the service can answer in.
    pub supported_locales: Vec<String>,
    /// Locale used when nothing in `Accept-Language` matches.
    pub default_locale: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            supported_locales: vec!["en-US".to_string()],
            default_locale: "en-US".to_string(),
        }
    }
}

/// One origin substitution applied to response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UrlSubstitution {
    pub from: String,
    pub to: String,
}

/// Deployment environment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Environment tag (production, beta, local, ...).
    pub tag: String,
    /// Substitutions applied in order. Production normally has none.
    pub url_substitutions: Vec<UrlSubstitution>,
    /// Largest body the rewriter will buffer.
    pub max_rewrite_bytes: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            tag: "production".to_string(),
            url_substitutions: Vec::new(),
            max_rewrite_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Load shedding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Enable load shedding.
    pub enabled: bool,
    /// Runtime lag above which new requests are rejected.
    pub max_lag_ms: u64,
    /// How often the lag sampler wakes up.
    pub sample_interval_ms: u64,
    /// Number of samples the lag estimate is smoothed over (1 = raw).
    pub smoothing_window: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_lag_ms: 70,
            sample_interval_ms: 500,
            smoothing_window: 3,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Paths answered by the health gate.
    pub paths: Vec<String>,
    /// Storage ping timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            paths: vec!["/__heartbeat__".to_string()],
            timeout_ms: 2000,
        }
    }
}

/// Storage driver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Memory,
    Tcp,
}

/// Storage collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub driver: StorageDriver,
    /// Address of the storage server (tcp driver only).
    pub address: String,
    pub connect_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::Memory,
            address: "127.0.0.1:3306".to_string(),
            connect_timeout_ms: 2000,
        }
    }
}

/// Crypto worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Maximum concurrent hash operations.
    pub workers: usize,
    /// Default bcrypt cost.
    pub work_factor: u32,
    /// How long shutdown waits for outstanding hashes.
    pub drain_timeout_secs: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            work_factor: 12,
            drain_timeout_secs: 10,
        }
    }
}

/// Shutdown deadlines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to drain in-flight connections.
    pub drain_timeout_secs: u64,
    /// Maximum time for each resource release step.
    pub step_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
            step_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
