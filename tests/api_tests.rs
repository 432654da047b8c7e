/// End-to-end tests for the HTTP API
///
/// Each test builds the full router over a fresh database in a temporary
/// directory and drives it with `oneshot` requests.
use agora::{server::build_router, AppContext, ServerConfig};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-0123456789";
const ADMIN_EMAIL: &str = "admin@example.com";

async fn app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::for_directory(dir.path().to_path_buf(), SECRET);
    config.authentication.bootstrap_admin_emails = vec![ADMIN_EMAIL.to_string()];

    let ctx = AppContext::new(config).await.unwrap();
    (build_router(ctx), dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

/// Sign up and return (uid, access token)
async fn sign_up(app: &Router, name: &str) -> (String, String) {
    let email = if name == "admin" {
        ADMIN_EMAIL.to_string()
    } else {
        format!("{}@example.com", name)
    };
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "correct horse battery", "username": name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "sign up {}: {}", name, body);

    (
        body["uid"].as_str().unwrap().to_string(),
        body["accessJwt"].as_str().unwrap().to_string(),
    )
}

async fn ask(app: &Router, token: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/questions",
        Some(token),
        Some(json!({ "title": "How do lifetimes work?", "body": "Asking for a friend" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn report(app: &Router, token: &str, question_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/reports",
        Some(token),
        Some(json!({
            "itemType": "question",
            "itemId": question_id,
            "reason": "spam",
            "details": "Link farm",
        })),
    )
    .await
}

async fn promote(app: &Router, admin: &str, uid: &str, role: &str) {
    let (status, body) = send(
        app,
        Method::PUT,
        &format!("/api/admin/users/{}/role", uid),
        Some(admin),
        Some(json!({ "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (app, _dir) = app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_reports_role_and_capabilities() {
    let (app, _dir) = app().await;
    let (_, member) = sign_up(&app, "alice").await;
    let (_, admin) = sign_up(&app, "admin").await;

    let (status, body) = send(&app, Method::GET, "/api/session", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    let capabilities = body["capabilities"].as_array().unwrap();
    assert!(capabilities.contains(&json!("canReport")));
    assert!(!capabilities.contains(&json!("canHandleReports")));

    let (_, body) = send(&app, Method::GET, "/api/session", Some(&admin), None).await;
    assert_eq!(body["role"], "admin");
    assert!(body["capabilities"]
        .as_array()
        .unwrap()
        .contains(&json!("canManageRoles")));
}

#[tokio::test]
async fn test_missing_or_revoked_token_is_unauthorized() {
    let (app, _dir) = app().await;

    let (status, body) = send(&app, Method::GET, "/api/session", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AuthenticationRequired");

    let (_, token) = sign_up(&app, "alice").await;
    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let (app, _dir) = app().await;
    sign_up(&app, "alice").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "not the password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["accessJwt"].is_string());
}

#[tokio::test]
async fn test_report_moderation_flow() {
    let (app, _dir) = app().await;
    let (_, admin) = sign_up(&app, "admin").await;
    let (_, author) = sign_up(&app, "alice").await;
    let (_, reporter) = sign_up(&app, "bob").await;
    let (moderator_uid, moderator) = sign_up(&app, "carol").await;

    let question_id = ask(&app, &author).await;
    let (status, created) = report(&app, &reporter, &question_id).await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    assert_eq!(created["status"], "pending");
    let report_id = created["id"].as_str().unwrap().to_string();

    // Members cannot see the queue
    let (status, _) = send(&app, Method::GET, "/api/reports", Some(&reporter), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    promote(&app, &admin, &moderator_uid, "moderator").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reports?status=pending",
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reports/{}/resolve", report_id),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");

    // Terminal reports stay terminal
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reports/{}/dismiss", report_id),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "InvalidTransition");
}

#[tokio::test]
async fn test_remove_deletes_reported_question() {
    let (app, _dir) = app().await;
    let (_, admin) = sign_up(&app, "admin").await;
    let (_, author) = sign_up(&app, "alice").await;
    let (_, reporter) = sign_up(&app, "bob").await;

    let question_id = ask(&app, &author).await;
    let (_, created) = report(&app, &reporter, &question_id).await;
    let report_id = created["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reports/{}/remove", report_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "removed");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/questions/{}", question_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The removing report is kept for the audit trail
    let (_, body) = send(&app, Method::GET, "/api/reports?status=removed", Some(&admin), None).await;
    assert_eq!(body["reports"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_edit_question_requires_authorship_or_moderation() {
    let (app, _dir) = app().await;
    let (_, admin) = sign_up(&app, "admin").await;
    let (_, author) = sign_up(&app, "alice").await;
    let (_, other) = sign_up(&app, "bob").await;
    let question_id = ask(&app, &author).await;
    let uri = format!("/api/questions/{}", question_id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&author),
        Some(json!({ "title": "How do lifetimes really work?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["title"], "How do lifetimes really work?");
    assert_eq!(body["body"], "Asking for a friend");

    let (status, _) = send(&app, Method::PUT, &uri, Some(&other), Some(json!({ "body": "Mine now" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({ "body": "Edited by staff" }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["body"], "Edited by staff");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/questions/missing",
        Some(&admin),
        Some(json!({ "body": "text" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report_validation() {
    let (app, _dir) = app().await;
    let (_, author) = sign_up(&app, "alice").await;
    let (_, reporter) = sign_up(&app, "bob").await;
    let question_id = ask(&app, &author).await;

    // Own content
    let (status, _) = report(&app, &author, &question_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing reason
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/reports",
        Some(&reporter),
        Some(json!({ "itemType": "question", "itemId": question_id, "details": "spam" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown item
    let (status, _) = report(&app, &reporter, "no-such-question").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_banned_user_is_rejected() {
    let (app, _dir) = app().await;
    let (_, admin) = sign_up(&app, "admin").await;
    let (bob_uid, bob) = sign_up(&app, "bob").await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/users/{}/ban", bob_uid),
        Some(&admin),
        Some(json!({ "reason": "spam" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/session", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AccountBanned");

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/users/{}/unban", bob_uid),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/session", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_role_management_requires_capability() {
    let (app, _dir) = app().await;
    let (admin_uid, admin) = sign_up(&app, "admin").await;
    let (moderator_uid, moderator) = sign_up(&app, "carol").await;
    promote(&app, &admin, &moderator_uid, "moderator").await;

    let (status, _) = send(&app, Method::GET, "/api/admin/roles", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/api/admin/roles", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    // Moderators can ban but cannot change roles
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/users/{}/role", admin_uid),
        Some(&moderator),
        Some(json!({ "role": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/users/{}/role", moderator_uid),
        Some(&admin),
        Some(json!({ "role": "superuser" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Role names are matched exactly
    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/users/{}/role", moderator_uid),
        Some(&admin),
        Some(json!({ "role": "Admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/admin/stats", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["usersByRole"]["moderator"], 1);
}

#[tokio::test]
async fn test_navigation_decisions() {
    let (app, _dir) = app().await;
    let (_, admin) = sign_up(&app, "admin").await;
    let (_, member) = sign_up(&app, "alice").await;

    let (status, body) = send(&app, Method::GET, "/api/navigation?path=/admin/roles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "redirectToSignIn");
    assert_eq!(body["location"], "/login?redirect=%2Fadmin%2Froles");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/navigation?path=/admin/roles",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(body["decision"], "redirectHome");
    assert_eq!(body["location"], "/");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/navigation?path=/admin/roles",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(body["decision"], "allow");
    assert!(body["location"].is_null());

    // Public pages need no session
    let (_, body) = send(&app, Method::GET, "/api/navigation?path=/questions", None, None).await;
    assert_eq!(body["decision"], "allow");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/navigation/visibility?minRole=moderator",
        Some(&member),
        None,
    )
    .await;
    assert_eq!(body["visibility"], "hidden");

    // A capability outside the table is simply not held, even by admins
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/navigation/visibility?capability=canDoAnything",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visibility"], "hidden");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/navigation/visibility?capability=canManageRoles",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(body["visibility"], "visible");
}

#[tokio::test]
async fn test_profile_update_changes_display_name() {
    let (app, _dir) = app().await;
    let (_, token) = sign_up(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/profile",
        Some(&token),
        Some(json!({ "username": "alice2", "bio": "Rustacean" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["username"], "alice2");
    assert_eq!(body["bio"], "Rustacean");

    let (_, session) = send(&app, Method::GET, "/api/session", Some(&token), None).await;
    assert_eq!(session["displayName"], "alice2");

    let (status, _) = send(&app, Method::PUT, "/api/profile", Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
