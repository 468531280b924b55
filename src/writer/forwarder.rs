//! Write forwarding.
//!
//! # Data Flow
//! ```text
//! write request (method, path?query, headers, body)
//!     → buffer body (bounded)
//!     → strip hop-by-hop headers, add x-forwarded-for
//!     → spawned exchange with {writer-origin}{path?query}
//!     → writer status + headers + body relayed to caller
//! ```
//!
//! # Design Decisions
//! - A write is never executed locally and never retried. Any failure
//!   becomes a generic error status (502 unreachable, 504 timeout)
//! - Writer answers, including 4xx/5xx rejections, are relayed unchanged so
//!   the caller can tell "rejected" from "unreachable"
//! - Once issued, the exchange runs in its own task: a caller that hangs up
//!   does not cancel a write that may already have taken effect

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    response::Response,
};

use crate::http::context::RequestContext;
use crate::http::contract::error_response;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;
use crate::writer::client::{ForwardError, WriterClient, WriterResponse};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe one connection, not the message.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Forwards write-classified requests to the writer node.
#[derive(Clone)]
pub struct WriteForwarder {
    client: WriterClient,
    max_body: usize,
}

impl WriteForwarder {
    pub fn new(client: WriterClient, max_body: usize) -> Self {
        Self { client, max_body }
    }

    /// Forward `request` and relay the outcome.
    pub async fn forward(&self, ctx: &RequestContext, request: Request<Body>) -> Response {
        let started = Instant::now();
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| request.uri().path().to_owned());

        tracing::debug!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %path_and_query,
            writer = %self.client.endpoint(),
            "Forwarding write"
        );

        match self.exchange(ctx, request, &path_and_query).await {
            Ok(reply) => {
                metrics::record_forward("relayed", reply.status.as_u16(), started);
                if reply.status.is_server_error() {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        status = %reply.status,
                        "Writer rejected write"
                    );
                }
                relay(reply)
            }
            Err(e) => {
                let status = e.status();
                metrics::record_forward(e.kind(), status.as_u16(), started);
                tracing::error!(
                    request_id = %ctx.request_id,
                    path = %path_and_query,
                    writer = %self.client.endpoint(),
                    error = %e,
                    "Write forwarding failed"
                );
                error_response(status)
            }
        }
    }

    async fn exchange(
        &self,
        ctx: &RequestContext,
        request: Request<Body>,
        path_and_query: &str,
    ) -> Result<WriterResponse, ForwardError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body)
            .await
            .map_err(ForwardError::RequestBody)?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let mut outbound = self
            .client
            .request_builder(parts.method, path_and_query)
            .version(axum::http::Version::HTTP_11);
        if let Some(headers) = outbound.headers_mut() {
            copy_end_to_end(&parts.headers, headers);
            headers.remove(header::HOST);
            headers.remove(header::CONTENT_LENGTH);
            if let Ok(id) = HeaderValue::from_str(&ctx.request_id) {
                headers.insert(X_REQUEST_ID, id);
            }
            if let Some(ip) = peer {
                append_forwarded_for(headers, &ip.to_string());
            }
        }
        let outbound = outbound.body(Body::from(body))?;

        // The issued write outlives the caller's connection.
        let client = self.client.clone();
        tokio::spawn(async move { client.send(outbound).await }).await?
    }
}

fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if !is_hop_by_hop(name) {
            to.append(name.clone(), value.clone());
        }
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

fn relay(reply: WriterResponse) -> Response {
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    copy_end_to_end(&reply.headers, response.headers_mut());
    response.headers_mut().remove(header::CONTENT_LENGTH);
    response
}
