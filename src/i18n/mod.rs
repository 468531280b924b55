//! Locale resolution.
//!
//! Resolves the request locale once, from `Accept-Language`, against the
//! configured supported locales. Handlers read the result from request
//! extensions; the response carries it back as `Content-Language`.

pub mod negotiation;

use std::fmt;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::Response,
};

use crate::config::I18nConfig;
use crate::http::context::RequestContext;
use crate::http::pipeline::{Flow, Stage};

/// A resolved, supported locale tag (e.g. `en-US`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag, lowercased (`en` for `en-US`).
    pub fn language(&self) -> String {
        primary_subtag(&self.0)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Pipeline stage that attaches the negotiated [`Locale`].
pub struct Localization {
    supported: Vec<Locale>,
    default: Locale,
}

impl Localization {
    pub fn new(config: &I18nConfig) -> Self {
        let supported: Vec<Locale> = config.supported_locales.iter().map(Locale::new).collect();
        let default = supported
            .iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(&config.default_locale))
            .cloned()
            .unwrap_or_else(|| Locale::new(config.default_locale.clone()));

        Self { supported, default }
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default
    }

    /// Pick the best supported locale for an `Accept-Language` value.
    pub fn resolve(&self, accept_language: Option<&str>) -> Locale {
        accept_language
            .and_then(|value| negotiation::negotiate(value, &self.supported))
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl Stage for Localization {
    fn name(&self) -> &'static str {
        "localization"
    }

    async fn on_request(&self, ctx: &mut RequestContext, request: &mut Request<Body>) -> Flow {
        let accept = request
            .headers()
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        let locale = self.resolve(accept);

        request.extensions_mut().insert(locale.clone());
        ctx.locale = Some(locale);
        Flow::Continue
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(locale) = &ctx.locale else { return };
        if response.headers().contains_key(header::CONTENT_LANGUAGE) {
            return;
        }
        if let Ok(value) = HeaderValue::from_str(locale.as_str()) {
            response.headers_mut().insert(header::CONTENT_LANGUAGE, value);
        }
    }
}
