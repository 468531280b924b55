//! Security response headers.
//!
//! # Responsibilities
//! - Transport security (`Strict-Transport-Security`)
//! - Anti-framing (`X-Frame-Options`)
//! - Content security (`Content-Security-Policy`, `X-Content-Type-Options`)
//! - Privacy (`Referrer-Policy`)
//!
//! # Design Decisions
//! - Header values are built once from configuration; an unsendable value
//!   fails startup instead of failing requests
//! - Headers overwrite whatever a handler or the writer node set, so the
//!   policy is uniform across local and forwarded responses

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request},
    response::Response,
};
use thiserror::Error;

use crate::config::{FramePolicy, SecurityConfig};
use crate::http::context::RequestContext;
use crate::http::pipeline::{Flow, Stage};

#[derive(Debug, Error)]
#[error("invalid {header} value {value:?}")]
pub struct SecurityHeaderError {
    header: &'static str,
    value: String,
}

/// Precomputed policy headers applied to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig) -> Result<Self, SecurityHeaderError> {
        let mut headers = vec![(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        )];

        if config.hsts {
            let mut value = format!("max-age={}", config.hsts_max_age_secs);
            if config.hsts_include_subdomains {
                value.push_str("; includeSubDomains");
            }
            headers.push((
                header::STRICT_TRANSPORT_SECURITY,
                parse_value("Strict-Transport-Security", &value)?,
            ));
        }

        match config.frame_options {
            FramePolicy::Deny => headers.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"))),
            FramePolicy::SameOrigin => {
                headers.push((header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")))
            }
            FramePolicy::Off => {}
        }

        if let Some(csp) = &config.content_security_policy {
            headers.push((
                header::CONTENT_SECURITY_POLICY,
                parse_value("Content-Security-Policy", csp)?,
            ));
        }

        if let Some(policy) = &config.referrer_policy {
            headers.push((header::REFERRER_POLICY, parse_value("Referrer-Policy", policy)?));
        }

        Ok(Self { headers })
    }

    pub fn apply(&self, response: &mut Response) {
        let target = response.headers_mut();
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

fn parse_value(header: &'static str, value: &str) -> Result<HeaderValue, SecurityHeaderError> {
    HeaderValue::from_str(value).map_err(|_| SecurityHeaderError {
        header,
        value: value.to_string(),
    })
}

#[async_trait]
impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    async fn on_request(&self, _ctx: &mut RequestContext, _request: &mut Request<Body>) -> Flow {
        Flow::Continue
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        self.apply(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn applied(config: &SecurityConfig) -> Response {
        let mut response = (
            [(header::X_FRAME_OPTIONS, "ALLOWALL")],
            "body",
        )
            .into_response();
        SecurityHeaders::from_config(config).unwrap().apply(&mut response);
        response
    }

    #[test]
    fn default_policy() {
        let response = applied(&SecurityConfig::default());
        let headers = response.headers();

        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(
            headers[header::STRICT_TRANSPORT_SECURITY],
            "max-age=10886400; includeSubDomains"
        );
        assert!(headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .contains("frame-ancestors 'none'"));
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
    }

    #[test]
    fn disabled_flags_omit_headers() {
        let config = SecurityConfig {
            hsts: false,
            frame_options: FramePolicy::Off,
            content_security_policy: None,
            referrer_policy: None,
            ..SecurityConfig::default()
        };
        let response = applied(&config);
        let headers = response.headers();

        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(!headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(!headers.contains_key(header::REFERRER_POLICY));
        // Left as the handler set it.
        assert_eq!(headers[header::X_FRAME_OPTIONS], "ALLOWALL");
    }

    #[test]
    fn same_origin_framing() {
        let config = SecurityConfig {
            frame_options: FramePolicy::SameOrigin,
            ..SecurityConfig::default()
        };
        assert_eq!(applied(&config).headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    }
}
