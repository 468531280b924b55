//! HTTP client for the writer node.
//!
//! # Responsibilities
//! - Own the pooled connection client (hyper-util legacy `Client`)
//! - Build absolute requests against the writer origin
//! - Bound every exchange (request + response body) by one timeout
//!
//! # Design Decisions
//! - Plain HTTP only; the writer lives on the internal network
//! - Responses are buffered up to a size cap so callers can relay them
//!   after the connection is released
//! - Errors are classified by where the exchange failed so callers can map
//!   them to distinct statuses

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{request::Builder, HeaderMap, Method, Request, StatusCode},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::writer::endpoint::WriterEndpoint;

/// Why an exchange with the writer node failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("writer did not answer within {0:?}")]
    Timeout(Duration),
    #[error("writer unreachable: {0}")]
    Unreachable(#[source] hyper_util::client::legacy::Error),
    #[error("failed to read writer response: {0}")]
    ResponseBody(#[source] axum::Error),
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),
    #[error("failed to build writer request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("forwarding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ForwardError {
    /// Status surfaced to the original caller.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Unreachable(_) | ForwardError::ResponseBody(_) => StatusCode::BAD_GATEWAY,
            ForwardError::RequestBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ForwardError::Request(_) | ForwardError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Unreachable(_) => "unreachable",
            ForwardError::ResponseBody(_) => "response_body",
            ForwardError::RequestBody(_) => "request_body",
            ForwardError::Request(_) => "request",
            ForwardError::Task(_) => "task",
        }
    }
}

/// A fully buffered writer response.
#[derive(Debug)]
pub struct WriterResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Shared client for every exchange with the writer node.
#[derive(Clone)]
pub struct WriterClient {
    client: Client<HttpConnector, Body>,
    endpoint: WriterEndpoint,
    timeout: Duration,
    max_body: usize,
}

impl WriterClient {
    pub fn new(endpoint: WriterEndpoint, timeout: Duration, max_body: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            endpoint,
            timeout,
            max_body,
        }
    }

    pub fn endpoint(&self) -> &WriterEndpoint {
        &self.endpoint
    }

    /// Request builder aimed at `{origin}{path_and_query}`.
    pub fn request_builder(&self, method: Method, path_and_query: &str) -> Builder {
        Request::builder()
            .method(method)
            .uri(self.endpoint.url_for(path_and_query))
    }

    /// Send one request and buffer the response.
    pub async fn send(&self, request: Request<Body>) -> Result<WriterResponse, ForwardError> {
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(ForwardError::Unreachable)?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), self.max_body)
                .await
                .map_err(ForwardError::ResponseBody)?;
            Ok(WriterResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        }
    }
}
