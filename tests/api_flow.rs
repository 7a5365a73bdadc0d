use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use notekeeper::{app::build_app, auth::jwt::JwtKeys, config::AppConfig, state::AppState};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    build_app(AppState::fake())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
    let creds = json!({ "username": username, "password": password });
    let (status, _) = call(app, "POST", "/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = call(app, "POST", "/login", None, Some(creds)).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn timestamp(v: &Value) -> OffsetDateTime {
    OffsetDateTime::parse(
        v.as_str().unwrap(),
        &time::format_description::well_known::Rfc3339,
    )
    .unwrap()
}

#[tokio::test]
async fn health_endpoint() {
    let (status, body) = call(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn note_lifecycle_end_to_end() {
    let app = app();
    let token = register_and_login(&app, "alice", "pw12345").await;

    let (status, created) = call(
        &app,
        "POST",
        "/notes",
        Some(token.as_str()),
        Some(json!({ "content": "hello world" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["content"], "hello world");
    assert_eq!(created["title"], "hello world");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/notes/{}", id),
        Some(token.as_str()),
        Some(json!({ "content": "hello world, updated" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "hello world, updated");
    assert!(timestamp(&updated["updatedAt"]) > timestamp(&created["updatedAt"]));
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let (status, body) = call(&app, "DELETE", &format!("/notes/{}", id), Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Note deleted successfully");

    let (status, list) = call(&app, "GET", "/notes", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn register_validation_and_duplicates() {
    let app = app();
    let (status, _) = call(&app, "POST", "/register", None, Some(json!({ "username": "bob" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register_and_login(&app, "bob", "pw").await;
    let (status, body) = call(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "bob", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already exists");
}

#[tokio::test]
async fn bad_logins_share_one_response() {
    let app = app();
    register_and_login(&app, "carol", "pw12345").await;

    let wrong_pw = call(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "carol", "password": "nope" })),
    )
    .await;
    let unknown = call(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "pw12345" })),
    )
    .await;
    assert_eq!(wrong_pw.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw, unknown);
}

#[tokio::test]
async fn verify_token_reports_subject() {
    let app = app();
    let token = register_and_login(&app, "dave", "pw12345").await;
    let (status, body) = call(&app, "GET", "/verify-token", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let keys = JwtKeys::from_config(&AppConfig::for_tests().jwt);
    let claims = keys.verify(&token).unwrap();
    assert_eq!(body["userId"], claims.sub.to_string());
}

#[tokio::test]
async fn session_failures_are_rejected_before_the_store() {
    let app = app();
    let (status, body) = call(&app, "GET", "/notes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, body) = call(&app, "GET", "/notes", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid token");

    let keys = JwtKeys::from_config(&AppConfig::for_tests().jwt);
    let expired = keys
        .sign_issued_at(Uuid::new_v4(), OffsetDateTime::now_utc() - time::Duration::hours(2))
        .unwrap();
    let (status, body) = call(&app, "GET", "/notes", Some(expired.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token expired");

    let (status, _) = call(
        &app,
        "POST",
        "/notes",
        None,
        Some(json!({ "content": "never stored" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_users_notes_are_not_found() {
    let app = app();
    let alice = register_and_login(&app, "alice", "pw12345").await;
    let bob = register_and_login(&app, "bob", "hunter2").await;

    let (_, note) = call(
        &app,
        "POST",
        "/notes",
        Some(alice.as_str()),
        Some(json!({ "title": "Private", "content": "alice only" })),
    )
    .await;
    let uri = format!("/notes/{}", note["id"].as_str().unwrap());

    let (_, bobs) = call(&app, "GET", "/notes", Some(bob.as_str()), None).await;
    assert_eq!(bobs, json!([]));

    let (status, _) = call(&app, "PUT", &uri, Some(bob.as_str()), Some(json!({ "content": "mine now" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "DELETE", &uri, Some(bob.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, alices) = call(&app, "GET", "/notes", Some(alice.as_str()), None).await;
    assert_eq!(alices[0]["content"], "alice only");
    assert_eq!(alices[0]["title"], "Private");
}

#[tokio::test]
async fn unknown_or_malformed_ids_are_not_found() {
    let app = app();
    let token = register_and_login(&app, "erin", "pw12345").await;

    let (status, _) = call(&app, "DELETE", &format!("/notes/{}", Uuid::new_v4()), Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "DELETE", "/notes/12345", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_is_most_recently_updated_first() {
    let app = app();
    let token = register_and_login(&app, "frank", "pw12345").await;

    let mut ids = Vec::new();
    for content in ["first", "second", "third"] {
        let (_, note) = call(&app, "POST", "/notes", Some(token.as_str()), Some(json!({ "content": content }))).await;
        ids.push(note["id"].as_str().unwrap().to_string());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    call(
        &app,
        "PUT",
        &format!("/notes/{}", ids[0]),
        Some(token.as_str()),
        Some(json!({ "title": "renamed" })),
    )
    .await;

    let (_, list) = call(&app, "GET", "/notes", Some(token.as_str()), None).await;
    let listed: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[0].as_str(), ids[2].as_str(), ids[1].as_str()]);
}

#[tokio::test]
async fn create_requires_content_and_generate_title_is_stateless() {
    let app = app();
    let token = register_and_login(&app, "grace", "pw12345").await;

    let (status, _) = call(&app, "POST", "/notes", Some(token.as_str()), Some(json!({ "title": "empty" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let content = "Buy milk, eggs, and bread from the store today";
    let (status, title) = call(
        &app,
        "POST",
        "/notes/generate-title",
        Some(token.as_str()),
        Some(json!({ "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(title, Value::String(content.into()));

    let (_, list) = call(&app, "GET", "/notes", Some(token.as_str()), None).await;
    assert_eq!(list, json!([]));
}

async fn post_raw(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: &'static str,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method("POST").uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    if let Some(ct) = content_type {
        req = req.header(header::CONTENT_TYPE, ct);
    }
    let response = app
        .clone()
        .oneshot(req.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn unreadable_bodies_get_the_json_error_shape() {
    let app = app();
    let (status, body) = post_raw(&app, "/register", None, Some("application/json"), "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");

    let (status, body) = post_raw(
        &app,
        "/login",
        None,
        Some("application/json"),
        r#"{"username": null, "password": "pw"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");

    let token = register_and_login(&app, "ivan", "pw12345").await;
    let (status, body) = post_raw(&app, "/notes", Some(token.as_str()), None, r#"{"content":"x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
}
