use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use newsai_core::SessionData;
use std::sync::Arc;

use crate::AppState;

/// Session attached to a request by [`resolve_session`].
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub data: SessionData,
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Attach the session named by the cookie, if any. Lookup failures leave the
/// request anonymous.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(sid) = cookie_value(request.headers(), &state.settings.session_cookie_name) {
        match state.storage.get_session(&sid).await {
            Ok(Some(data)) => {
                tracing::debug!(user_id = %data.user_id, "Session resolved");
                request.extensions_mut().insert(ActiveSession { data });
            }
            Ok(None) => tracing::debug!("Unknown or expired session"),
            Err(e) => tracing::warn!(error = %e, "Session lookup failed"),
        }
    }
    next.run(request).await
}
