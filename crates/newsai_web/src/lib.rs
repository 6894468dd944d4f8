use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{routing::get, Router};
use newsai_core::Settings;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub mod envelope;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub const API_PREFIX: &str = "/api/v1";

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

/// CORS from settings; `None` when no origins are configured.
pub fn cors_layer(settings: &Settings) -> Option<CorsLayer> {
    if settings.cors_origins.is_empty() {
        return None;
    }

    let origins = if is_wildcard(&settings.cors_origins) {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(settings.cors_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin.trim())
                .map_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        }))
    };

    let methods = if is_wildcard(&settings.cors_allow_methods) {
        AllowMethods::mirror_request()
    } else {
        AllowMethods::list(
            settings
                .cors_allow_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok()),
        )
    };

    let headers = if is_wildcard(&settings.cors_allow_headers) {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(
            settings
                .cors_allow_headers
                .iter()
                .filter_map(|h| HeaderName::from_bytes(h.trim().as_bytes()).ok()),
        )
    };

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(settings.cors_allow_credentials),
    )
}

async fn not_found() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND)
}

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/fields", get(handlers::list_fields))
        .route(
            "/interests",
            get(handlers::list_interests)
                .post(handlers::add_interest)
                .delete(handlers::remove_interest),
        )
        .route("/users/me", get(handlers::read_me))
        .route("/articles/:slug", get(handlers::get_article));

    let mut app = Router::new()
        .nest(API_PREFIX, api)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), middleware::resolve_session))
        .layer(from_fn(middleware::envelope_bare_errors))
        .layer(CatchPanicLayer::custom(middleware::fallback::handle_panic));

    if let Some(cors) = cors_layer(&state.settings) {
        app = app.layer(cors);
    }

    app.layer(from_fn_with_state(state.clone(), middleware::request_context))
        .with_state(state)
}

pub mod prelude {
    pub use crate::envelope::{ErrorBody, Success};
    pub use crate::{create_app, ApiError, AppState};
}
