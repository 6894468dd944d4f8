use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::redact::{redact_headers, summarize_body};
use crate::{ApiError, AppState};

/// Largest request body buffered for handlers and logging.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

const FALLBACK_REQUEST_ID_HEADER: &str = "x-request-id";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn query_map(query: Option<&str>) -> Value {
    let mut out = Map::new();
    for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(key.to_string(), Value::String(value.to_string()));
    }
    Value::Object(out)
}

/// Request id, tracing span and one `access` event per request.
pub async fn request_context(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let settings = &state.settings;
    let started = Instant::now();

    let request_id = header_str(request.headers(), &settings.request_id_header)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = query_map(request.uri().query());
    let request_headers = if settings.log_request_headers {
        redact_headers(request.headers())
    } else {
        Value::Null
    };
    let request_content_type =
        header_str(request.headers(), CONTENT_TYPE.as_str()).map(str::to_string);

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let (parts, body) = request.into_parts();
    let (mut response, request_payload) = match to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => {
            let payload = summarize_body(
                &bytes,
                request_content_type.as_deref(),
                settings.log_max_body_bytes,
            );
            let request = Request::from_parts(parts, Body::from(bytes));
            let response = next.run(request).instrument(span.clone()).await;
            (response, payload)
        }
        Err(e) => {
            span.in_scope(|| tracing::warn!(error = %e, "Failed to read request body"));
            (ApiError::http(StatusCode::PAYLOAD_TOO_LARGE).into_response(), Value::Null)
        }
    };

    let status = response.status();
    let mut response_payload = Value::Null;
    if status != StatusCode::NO_CONTENT && status != StatusCode::NOT_MODIFIED {
        let (parts, body) = response.into_parts();
        let bytes = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "Failed to read response body"));
                Default::default()
            }
        };
        response_payload = summarize_body(
            &bytes,
            header_str(&parts.headers, CONTENT_TYPE.as_str()),
            settings.log_max_body_bytes,
        );
        response = Response::from_parts(parts, Body::from(bytes));
    }

    let header_name = HeaderName::from_bytes(settings.request_id_header.as_bytes())
        .unwrap_or_else(|_| HeaderName::from_static(FALLBACK_REQUEST_ID_HEADER));
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(header_name, value);
    }

    let response_headers = if settings.log_response_headers {
        redact_headers(response.headers())
    } else {
        Value::Null
    };
    let duration_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

    span.in_scope(|| {
        tracing::info!(
            target: "access",
            method = %method,
            path = %path,
            query = %query,
            status = status.as_u16(),
            duration_ms,
            request = %request_payload,
            response = %response_payload,
            request_headers = %request_headers,
            response_headers = %response_headers,
            "access"
        )
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_map() {
        assert_eq!(query_map(Some("a=1&b=&c")), json!({ "a": "1", "b": "", "c": "" }));
        assert_eq!(query_map(None), json!({}));
    }
}
