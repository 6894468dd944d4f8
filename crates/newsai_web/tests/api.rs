use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, Utc};
use newsai_core::prelude::*;
use newsai_core::storage::*;
use newsai_storage::{create_storage, InMemoryStorage};
use newsai_web::services::sessions::issue_session;
use newsai_web::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct Fixture {
    app: Router,
    storage: Arc<dyn Storage>,
    cookie: String,
    cs: Field,
    ai: Field,
    math: Field,
}

async fn fixture_with(settings: Settings) -> Fixture {
    fixture_on(Arc::new(InMemoryStorage::new()), settings).await
}

async fn fixture_on(storage: Arc<dyn Storage>, settings: Settings) -> Fixture {
    let math = storage
        .insert_field(&NewField::top_level("math", "Mathematics", None))
        .await
        .unwrap();
    let cs = storage
        .insert_field(&NewField::top_level("cs", "Computer Science", Some(1)))
        .await
        .unwrap();
    let ai = storage
        .insert_field(&NewField::child_of(&cs, "cs.AI", "Artificial Intelligence", Some(2)))
        .await
        .unwrap();
    storage
        .insert_field(&NewField::child_of(&cs, "cs.CL", "Computation and Language", Some(1)))
        .await
        .unwrap();

    storage.ensure_role("reader", None).await.unwrap();
    let user = storage
        .insert_user(&NewUser::with_email("user@example.com"), &["reader".to_string()])
        .await
        .unwrap();
    let (sid, _) = issue_session(storage.as_ref(), &settings, user.id).await.unwrap();
    let cookie = format!("{}={}", settings.session_cookie_name, sid);

    let app = create_app(AppState::new(storage.clone(), settings));
    Fixture {
        app,
        storage,
        cookie,
        cs,
        ai,
        math,
    }
}

async fn fixture() -> Fixture {
    fixture_with(Settings::default()).await
}

async fn sqlite_fixture() -> Fixture {
    let storage = create_storage("sqlite", "sqlite::memory:").await.unwrap();
    fixture_on(storage, Settings::default()).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn with_json(method: Method, uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let f = fixture().await;
    let response = f.app.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json_body(response).await, json!({ "code": 200, "data": { "status": "ok" } }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let f = fixture().await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("X-Request-ID", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = f.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_fields_tree_is_ordered() {
    let f = fixture().await;
    let (status, body) = send(&f.app, get("/api/v1/fields", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);

    let fields = body["data"].as_array().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["code"], "cs");
    assert_eq!(fields[1]["code"], "math");
    let subfields: Vec<&str> = fields[0]["subfields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["code"].as_str().unwrap())
        .collect();
    assert_eq!(subfields, vec!["cs.CL", "cs.AI"]);
    assert_eq!(fields[1]["subfields"], json!([]));
}

#[tokio::test]
async fn test_interests_require_session() {
    let f = fixture().await;
    let (status, body) = send(&f.app, get("/api/v1/interests", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({ "code": 401, "title": "AuthenticationError", "message": "Not authenticated" })
    );

    let (status, _) = send(&f.app, get("/api/v1/interests", Some("sid=bogus"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_is_anonymous() {
    let f = fixture().await;
    let user = f.storage.user_by_email("user@example.com").await.unwrap().unwrap();
    let stale = SessionData {
        user_id: user.id,
        roles: vec![],
        expires_at: Utc::now() - Duration::seconds(5),
    };
    f.storage.put_session("stale", &stale).await.unwrap();

    let (status, body) = send(&f.app, get("/api/v1/users/me", Some("sid=stale"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authenticated");
}

#[tokio::test]
async fn test_session_for_missing_user() {
    let f = fixture().await;
    let orphan = SessionData {
        user_id: Uuid::new_v4(),
        roles: vec![],
        expires_at: Utc::now() + Duration::minutes(5),
    };
    f.storage.put_session("orphan", &orphan).await.unwrap();

    let (status, body) = send(&f.app, get("/api/v1/users/me", Some("sid=orphan"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["title"], "AuthenticationError");
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn test_interest_lifecycle() {
    let f = fixture().await;
    let user = f.storage.user_by_email("user@example.com").await.unwrap().unwrap();

    let (status, body) = send(&f.app, get("/api/v1/interests", Some(&f.cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "code": 200, "data": [] }));

    let add = |field: Uuid| {
        with_json(Method::POST, "/api/v1/interests", &f.cookie, json!({ "field_id": field }))
    };

    let (status, body) = send(&f.app, add(f.ai.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["message"],
        format!("Successfully added interest for field {} and user {}", f.ai.id, user.id)
    );

    let (status, body) = send(&f.app, add(f.ai.id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        json!({
            "code": 409,
            "title": "DuplicateInterestError",
            "message": "Interest already added"
        })
    );

    let (status, body) = send(&f.app, add(Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "code": 400, "title": "APIError", "message": "Invalid user_id or field_id" })
    );

    send(&f.app, add(f.math.id)).await;
    let (_, body) = send(&f.app, get("/api/v1/interests", Some(&f.cookie))).await;
    let nodes = body["data"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["id"], json!(f.cs.id));
    assert_eq!(nodes[0]["subfields"][0]["id"], json!(f.ai.id));
    assert_eq!(nodes[1]["id"], json!(f.math.id));

    let remove = || {
        with_json(Method::DELETE, "/api/v1/interests", &f.cookie, json!({ "field_id": f.ai.id }))
    };
    let (status, body) = send(&f.app, remove()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["message"],
        format!("Successfully removed field {} from user's interest", f.ai.id)
    );

    let (status, body) = send(&f.app, remove()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Interest not found");
}

#[tokio::test]
async fn test_invalid_body_is_validation_error() {
    let f = fixture().await;
    let request = with_json(
        Method::POST,
        "/api/v1/interests",
        &f.cookie,
        json!({ "field_id": "not-a-uuid" }),
    );
    let (status, body) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 422);
    assert_eq!(body["title"], "Validation Error");
}

#[tokio::test]
async fn test_users_me() {
    let f = fixture().await;
    let (status, body) = send(&f.app, get("/api/v1/users/me", Some(&f.cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "user@example.com");
    assert_eq!(body["data"]["roles"][0]["name"], "reader");
}

#[tokio::test]
async fn test_article_detail() {
    let f = fixture().await;
    let paper = f
        .storage
        .upsert_paper(&NewPaper {
            title: "Attention Is All You Need".to_string(),
            arxiv_id: Some("1706.03762".to_string()),
            primary_field_id: Some(f.cs.id),
            primary_subfield_id: Some(f.ai.id),
            ..Default::default()
        })
        .await
        .unwrap();
    let author = f
        .storage
        .upsert_author(&NewAuthor {
            name: "Ashish Vaswani".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    f.storage
        .link_author(&PaperAuthor {
            paper_id: paper.id,
            author_id: author.id,
            author_order: 1,
            corresponding: false,
        })
        .await
        .unwrap();
    f.storage
        .insert_article(
            &NewArticle {
                paper_id: paper.id,
                title: "Transformers, explained".to_string(),
                slug: "transformers-explained".to_string(),
                status: Some("published".to_string()),
                featured_image_url: None,
            },
            &[
                NewBlock::new(BlockType::Paragraph, "Body", 2),
                NewBlock::new(BlockType::Title, "Transformers, explained", 1),
            ],
        )
        .await
        .unwrap();

    let (status, body) = send(&f.app, get("/api/v1/articles/transformers-explained", None)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["paper"]["arxiv_id"], "1706.03762");
    assert_eq!(data["authors"][0]["name"], "Ashish Vaswani");
    assert_eq!(data["blocks"][0]["block_type"], "title");
    assert_eq!(data["blocks"][1]["block_type"], "paragraph");

    let (status, body) = send(&f.app, get("/api/v1/articles/missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["title"], "ArticleNotFound");
}

#[tokio::test]
async fn test_framework_errors_are_enveloped() {
    let f = fixture().await;
    let (status, body) = send(&f.app, get("/api/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "code": 404, "title": "HTTP Error", "message": "Not Found" }));

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/v1/fields")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["title"], "HTTP Error");
    assert_eq!(body["message"], "Method Not Allowed");
}

#[tokio::test]
async fn test_cors_preflight() {
    let settings = Settings {
        cors_origins: vec!["http://localhost:3000".to_string()],
        ..Settings::default()
    };
    let f = fixture_with(settings).await;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/interests")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = f.app.clone().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let f = fixture().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/interests")
        .header(header::COOKIE, &f.cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(vec![b'a'; 2 * 1024 * 1024 + 1]))
        .unwrap();
    let (status, body) = send(&f.app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body,
        json!({ "code": 413, "title": "HTTP Error", "message": "Payload Too Large" })
    );
}

#[tokio::test]
async fn test_json_content_type_is_required() {
    let f = fixture().await;
    let payload = json!({ "field_id": f.cs.id }).to_string();
    for content_type in [None, Some("text/plain")] {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/interests")
            .header(header::COOKIE, &f.cookie);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(payload.clone())).unwrap();
        let (status, body) = send(&f.app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{:?}", content_type);
        assert_eq!(body["title"], "Validation Error");
    }
    let (_, listed) = send(&f.app, get("/api/v1/interests", Some(&f.cookie))).await;
    assert_eq!(listed["data"], json!([]));
}

#[tokio::test]
async fn test_cors_disabled_without_origins() {
    let f = fixture().await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = f.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_interest_routes_on_sqlite() {
    let f = sqlite_fixture().await;
    let body = json!({ "field_id": f.ai.id });

    let (status, added) =
        send(&f.app, with_json(Method::POST, "/api/v1/interests", &f.cookie, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["code"], 200);

    let (status, dup) =
        send(&f.app, with_json(Method::POST, "/api/v1/interests", &f.cookie, body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["title"], "DuplicateInterestError");

    let (status, listed) = send(&f.app, get("/api/v1/interests", Some(&f.cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"][0]["code"], "cs");
    assert_eq!(listed["data"][0]["subfields"][0]["code"], "cs.AI");

    let (status, fields) = send(&f.app, get("/api/v1/fields", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fields["data"].as_array().unwrap().len(), 2);

    let (status, _) =
        send(&f.app, with_json(Method::DELETE, "/api/v1/interests", &f.cookie, body)).await;
    assert_eq!(status, StatusCode::OK);
}
