use std::io;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use newsai_core::Settings;
use newsai_storage::InMemoryStorage;
use newsai_web::middleware::request_context;
use newsai_web::{create_app, AppState};
use tower::ServiceExt;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn access_events(sink: &SharedBuffer) -> Vec<serde_json::Value> {
    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<serde_json::Value>(l).expect("json log line"))
        .filter(|v| v.get("target").and_then(|t| t.as_str()) == Some("access"))
        .collect()
}

fn json_subscriber(sink: &SharedBuffer) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish()
}

#[tokio::test]
async fn test_access_log_is_structured_and_redacted() {
    let sink = SharedBuffer::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(&sink));

    let app = create_app(AppState::new(
        Arc::new(InMemoryStorage::new()),
        Settings::default(),
    ));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/interests?source=test")
        .header("X-Request-ID", "req-7")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "sid=secret-cookie")
        .body(Body::from(
            r#"{"field_id":"00000000-0000-0000-0000-000000000000","password":"hunter2"}"#,
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let events = access_events(&sink);
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.get("level").and_then(|v| v.as_str()), Some("INFO"));
    assert_eq!(event["span"]["request_id"], "req-7");

    let fields = event.get("fields").expect("fields object");
    assert_eq!(fields["method"], "POST");
    assert_eq!(fields["path"], "/api/v1/interests");
    assert_eq!(fields["status"], 401);
    assert!(fields["query"].as_str().unwrap().contains("\"source\":\"test\""));

    let request_body = fields["request"].as_str().unwrap();
    assert!(request_body.contains("***"));
    assert!(!request_body.contains("hunter2"));

    let request_headers = fields["request_headers"].as_str().unwrap();
    assert!(!request_headers.contains("secret-cookie"));

    let response_body = fields["response"].as_str().unwrap();
    assert!(response_body.contains("AuthenticationError"));
}

#[tokio::test]
async fn test_headers_omitted_when_disabled() {
    let sink = SharedBuffer::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(&sink));

    let settings = Settings {
        log_request_headers: false,
        log_response_headers: false,
        ..Settings::default()
    };
    let app = create_app(AppState::new(Arc::new(InMemoryStorage::new()), settings));
    let request = Request::builder()
        .uri("/api/v1/health")
        .header(header::AUTHORIZATION, "Bearer abc")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = access_events(&sink);
    assert_eq!(events.len(), 1);
    let fields = &events[0]["fields"];
    assert_eq!(fields["request_headers"], "null");
    assert_eq!(fields["response_headers"], "null");
    assert!(fields["response"].as_str().unwrap().contains("\"ok\""));
}

#[tokio::test]
async fn test_no_content_body_is_not_logged() {
    let sink = SharedBuffer::default();
    let _guard = tracing::subscriber::set_default(json_subscriber(&sink));

    let state = Arc::new(AppState::new(
        Arc::new(InMemoryStorage::new()),
        Settings::default(),
    ));
    let app = Router::new()
        .route(
            "/empty",
            get(|| async { (StatusCode::NO_CONTENT, r#"{"token":"leak"}"#) }),
        )
        .layer(from_fn_with_state(state.clone(), request_context))
        .with_state(state);

    let request = Request::builder().uri("/empty").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let events = access_events(&sink);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["fields"]["status"], 204);
    assert_eq!(events[0]["fields"]["response"], "null");
}
