//! Structured response contract.
//!
//! Every machine-readable body this service produces is a JSON object.
//! [`ApiJson`] is the sanctioned way handlers emit structured responses; a
//! value that does not serialize to an object is never sent. It is logged as
//! an internal error and replaced with a generic 500 body.
//!
//! [`LocalJsonGuard`] backs this up for local handlers that bypass
//! `ApiJson` (a bare `axum::Json`, a hand-built body): any local JSON
//! response whose top-level value is not an object is replaced the same way.

use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::context::{RequestContext, RouteKind};
use crate::http::pipeline::ResponseStage;

/// A structured response guaranteed to carry a JSON object.
#[derive(Debug, Clone)]
pub struct ApiJson<T> {
    status: StatusCode,
    body: T,
}

impl<T> ApiJson<T> {
    /// A `200 OK` structured response.
    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn new(status: StatusCode, body: T) -> Self {
        Self { status, body }
    }
}

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.body) {
            Ok(Value::Object(map)) => (self.status, Json(map)).into_response(),
            Ok(other) => {
                tracing::error!(
                    kind = value_kind(&other),
                    status = %self.status,
                    "Structured response is not an object; sending internal error instead"
                );
                internal_error()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize structured response");
                internal_error()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    reason: &'static str,
}

/// Generic structured error for `status`, free of internal detail.
pub fn error_response(status: StatusCode) -> Response {
    ApiJson::new(
        status,
        ErrorBody {
            success: false,
            reason: status.canonical_reason().unwrap_or("error"),
        },
    )
    .into_response()
}

fn internal_error() -> Response {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(false));
    body.insert("reason".into(), Value::String("Internal Server Error".into()));
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Outbound check on JSON produced by local handlers.
///
/// Bodies without an exact size, or larger than `max_bytes`, pass unchecked.
pub struct LocalJsonGuard {
    max_bytes: usize,
}

impl LocalJsonGuard {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl ResponseStage for LocalJsonGuard {
    fn name(&self) -> &'static str {
        "local_json_guard"
    }

    async fn transform(&self, ctx: &RequestContext, response: Response) -> Response {
        if ctx.route != RouteKind::Local || !is_json(response.headers()) {
            return response;
        }
        match response.body().size_hint().exact() {
            Some(len) if len <= self.max_bytes as u64 => {}
            _ => return response,
        }

        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, self.max_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "Failed to buffer local JSON response");
                return internal_error();
            }
        };

        // A JSON document whose first token is `{` is an object.
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Response::from_parts(parts, Body::from(bytes)),
            _ => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    path = %ctx.path,
                    status = %parts.status,
                    "Local handler sent a non-object JSON body; sending internal error instead"
                );
                internal_error()
            }
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
