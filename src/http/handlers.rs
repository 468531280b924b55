//! Local (read) handlers.
//!
//! Everything not classified as a write is served here. Structured bodies
//! go through [`ApiJson`].

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::get,
    Extension, Router,
};
use serde::Serialize;

use crate::http::contract::{error_response, ApiJson};
use crate::http::server::AppState;
use crate::i18n::Locale;

/// Default local surface mounted by the binary.
pub fn local_router() -> Router<AppState> {
    Router::new().route("/wsapi/server_info", get(server_info))
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub version: &'static str,
    pub environment: String,
    pub locale: String,
}

async fn server_info(
    State(state): State<AppState>,
    locale: Option<Extension<Locale>>,
) -> ApiJson<ServerInfo> {
    let locale = match locale {
        Some(Extension(locale)) => locale.to_string(),
        None => state.config.i18n.default_locale.clone(),
    };
    ApiJson::ok(ServerInfo {
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.tag.clone(),
        locale,
    })
}

/// Fallback for unknown local paths.
pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND)
}
