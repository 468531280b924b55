//! Environment-specific response rewriting.
//!
//! # Responsibilities
//! - Substitute production origins with the deployment's own origin in
//!   outbound bodies (beta, local development)
//! - Leave binary, compressed and streamed responses untouched
//!
//! # Design Decisions
//! - Only bodies with an exact, bounded size are buffered. A streamed body
//!   has no exact size hint and passes through as-is
//! - Substitutions apply in configuration order, exact string matches
//! - No rules configured (the production default) makes the stage a no-op

use std::borrow::Cow;

use async_trait::async_trait;
use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};

use crate::config::{EnvironmentConfig, UrlSubstitution};
use crate::http::contract::error_response;
use crate::http::context::RequestContext;
use crate::http::pipeline::ResponseStage;

/// Rewrites origin URLs in eligible response bodies.
pub struct EnvironmentRewriter {
    rules: Vec<UrlSubstitution>,
    max_bytes: usize,
}

impl EnvironmentRewriter {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            rules: config.url_substitutions.clone(),
            max_bytes: config.max_rewrite_bytes,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.rules.is_empty()
    }

    fn is_rewritable(&self, response: &Response) -> bool {
        if !is_textual(response.headers()) || response.headers().contains_key(header::CONTENT_ENCODING) {
            return false;
        }
        match response.body().size_hint().exact() {
            Some(len) => len > 0 && len <= self.max_bytes as u64,
            None => false,
        }
    }
}

#[async_trait]
impl ResponseStage for EnvironmentRewriter {
    fn name(&self) -> &'static str {
        "environment_rewriter"
    }

    async fn transform(&self, ctx: &RequestContext, response: Response) -> Response {
        if !self.is_enabled() || !self.is_rewritable(&response) {
            return response;
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, self.max_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id, error = %e, "Failed to buffer response for rewriting");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let Ok(text) = std::str::from_utf8(&bytes) else {
            return Response::from_parts(parts, Body::from(bytes));
        };

        match rewrite_origins(text, &self.rules) {
            Cow::Borrowed(_) => Response::from_parts(parts, Body::from(bytes)),
            Cow::Owned(rewritten) => {
                tracing::trace!(request_id = %ctx.request_id, "Rewrote environment origins");
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                Response::from_parts(parts, Body::from(rewritten))
            }
        }
    }
}

/// Apply every substitution to `text`, borrowing when nothing matched.
pub fn rewrite_origins<'a>(text: &'a str, rules: &[UrlSubstitution]) -> Cow<'a, str> {
    let mut out = Cow::Borrowed(text);
    for rule in rules {
        if !rule.from.is_empty() && out.contains(rule.from.as_str()) {
            out = Cow::Owned(out.replace(rule.from.as_str(), &rule.to));
        }
    }
    out
}

fn is_textual(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime == "application/json"
        || mime.ends_with("+json")
        || mime == "application/javascript"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chunked::stream_body;

    const PROD: &str = "https://login.example.org";
    const LOCAL: &str = "http://127.0.0.1:10002";

    fn rewriter(rules: Vec<UrlSubstitution>) -> EnvironmentRewriter {
        EnvironmentRewriter {
            rules,
            max_bytes: 1024 * 1024,
        }
    }

    fn rule() -> Vec<UrlSubstitution> {
        vec![UrlSubstitution {
            from: PROD.into(),
            to: LOCAL.into(),
        }]
    }

    fn ctx() -> RequestContext {
        RequestContext::from_request(&Request::builder().uri("/").body(Body::empty()).unwrap())
    }

    fn html(body: String) -> Response {
        Response::builder()
            .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn text_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn replaces_every_occurrence() {
        let n = 5;
        let body = (0..n)
            .map(|i| format!("<a href=\"{PROD}/sign_in?{i}\">"))
            .collect::<String>();

        let response = rewriter(rule()).transform(&ctx(), html(body)).await;
        let len_header: usize = response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let text = text_of(response).await;

        assert_eq!(text.matches(LOCAL).count(), n);
        assert_eq!(text.matches(PROD).count(), 0);
        assert_eq!(len_header, text.len());
    }

    #[tokio::test]
    async fn no_rules_changes_nothing() {
        let body = format!("{{\"origin\":\"{PROD}\"}}");
        let response = rewriter(Vec::new()).transform(&ctx(), html(body.clone())).await;
        assert_eq!(text_of(response).await, body);
    }

    #[tokio::test]
    async fn binary_and_compressed_bodies_are_untouched() {
        let body = PROD.to_string();
        let binary = Response::builder()
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(body.clone()))
            .unwrap();
        let response = rewriter(rule()).transform(&ctx(), binary).await;
        assert_eq!(text_of(response).await, body);

        let gzipped = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::CONTENT_ENCODING, "gzip")
            .body(Body::from(body.clone()))
            .unwrap();
        let response = rewriter(rule()).transform(&ctx(), gzipped).await;
        assert_eq!(text_of(response).await, body);
    }

    #[tokio::test]
    async fn streamed_bodies_are_untouched() {
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/html")
            .body(stream_body(vec![PROD.to_string(), "/x".to_string()]))
            .unwrap();
        let response = rewriter(rule()).transform(&ctx(), response).await;
        assert_eq!(text_of(response).await, format!("{PROD}/x"));
    }

    #[test]
    fn rules_apply_in_order() {
        let rules = vec![
            UrlSubstitution { from: "a.example".into(), to: "b.example".into() },
            UrlSubstitution { from: "b.example".into(), to: "c.example".into() },
        ];
        assert_eq!(rewrite_origins("https://a.example", &rules), "https://c.example");
        assert!(matches!(rewrite_origins("nothing here", &rules), Cow::Borrowed(_)));
    }

    /// Body with no exact size hint, like a chunked upstream stream.
    mod chunked {
        use std::pin::Pin;
        use std::task::{Context, Poll};

        use axum::body::{Body, Bytes, HttpBody};
        use hyper::body::Frame;

        struct Chunks(Vec<String>);

        impl HttpBody for Chunks {
            type Data = Bytes;
            type Error = std::convert::Infallible;

            fn poll_frame(
                mut self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
                if self.0.is_empty() {
                    Poll::Ready(None)
                } else {
                    let chunk = self.0.remove(0);
                    Poll::Ready(Some(Ok(Frame::data(Bytes::from(chunk)))))
                }
            }
        }

        pub fn stream_body(chunks: Vec<String>) -> Body {
            Body::new(Chunks(chunks))
        }
    }
}
