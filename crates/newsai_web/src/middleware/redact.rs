//! Log-safe renderings of request and response payloads.

use axum::http::HeaderMap;
use serde_json::{json, Map, Value};

pub const REDACTED: &str = "***";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "access_token",
    "authorization",
    "secret",
    "api_key",
];

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "proxy-authorization",
];

/// Replace the value of every sensitive key, at any depth.
pub fn redact_json(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if SENSITIVE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact_json(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_json).collect()),
        other => other,
    }
}

pub fn redact_headers(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for name in headers.keys() {
        let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
            REDACTED.to_string()
        } else {
            headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ")
        };
        out.insert(name.as_str().to_string(), Value::String(value));
    }
    Value::Object(out)
}

fn maybe_json(data: &[u8], max_bytes: usize) -> Value {
    if data.len() > max_bytes {
        return json!({ "truncated": true, "size": data.len() });
    }
    serde_json::from_slice(data)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(data).into_owned()))
}

/// JSON payloads are parsed (or truncated) and redacted; anything else is
/// reduced to its size. Empty bodies render as `null`.
pub fn summarize_body(data: &[u8], content_type: Option<&str>, max_bytes: usize) -> Value {
    if data.is_empty() {
        return Value::Null;
    }
    match content_type {
        Some(ct) if ct.contains("application/json") => redact_json(maybe_json(data, max_bytes)),
        _ => json!({ "size": data.len() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
    use axum::http::HeaderValue;

    #[test]
    fn test_redacts_nested_keys() {
        let value = json!({
            "email": "a@example.com",
            "Password": "hunter2",
            "nested": [{ "api_key": "k", "keep": 1 }]
        });
        let redacted = redact_json(value);
        assert_eq!(redacted["Password"], "***");
        assert_eq!(redacted["nested"][0]["api_key"], "***");
        assert_eq!(redacted["nested"][0]["keep"], 1);
        assert_eq!(redacted["email"], "a@example.com");
    }

    #[test]
    fn test_redacts_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        headers.insert(COOKIE, HeaderValue::from_static("sid=abc"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let rendered = redact_headers(&headers);
        assert_eq!(rendered["authorization"], "***");
        assert_eq!(rendered["cookie"], "***");
        assert_eq!(rendered["content-type"], "application/json");
    }

    #[test]
    fn test_summarize_body() {
        let body = br#"{"field_id":"x","token":"t"}"#;
        let summary = summarize_body(body, Some("application/json"), 8192);
        assert_eq!(summary["token"], "***");

        let truncated = summarize_body(body, Some("application/json"), 4);
        assert_eq!(truncated, json!({ "truncated": true, "size": body.len() }));

        assert_eq!(summarize_body(b"hello", Some("text/plain"), 8192), json!({ "size": 5 }));
        assert_eq!(summarize_body(b"", Some("application/json"), 8192), Value::Null);
    }
}
