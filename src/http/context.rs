//! Per-request context carried through the pipeline.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request};

use crate::http::X_REQUEST_ID;
use crate::i18n::Locale;

/// Outcome of load shedding for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not evaluated (probe, or shedding disabled).
    Exempt,
    Admitted,
    Rejected,
}

/// Where the request was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Probe,
    Local,
    Forwarded,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Probe => "probe",
            RouteKind::Local => "local",
            RouteKind::Forwarded => "forwarded",
        }
    }
}

/// State owned by one request for the lifetime of the pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub started: Instant,
    pub locale: Option<Locale>,
    pub admission: Admission,
    pub route: RouteKind,
}

impl RequestContext {
    /// Create the context at pipeline entry.
    pub fn from_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            request_id,
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            started: Instant::now(),
            locale: None,
            admission: Admission::Exempt,
            route: RouteKind::Local,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_request_id_from_header() {
        let request = Request::builder()
            .uri("/wsapi/server_info?x=1")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.request_id, "abc-123");
        assert_eq!(ctx.path, "/wsapi/server_info");
        assert_eq!(ctx.admission, Admission::Exempt);
    }

    #[test]
    fn generates_request_id_when_missing() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let ctx = RequestContext::from_request(&request);
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }
}
