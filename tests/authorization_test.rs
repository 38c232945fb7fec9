mod common;

use council_auth::types::internal::Role;
use serde_json::json;

use common::{TestApp, bearer, read_json};

#[tokio::test]
async fn test_missing_header_is_unauthenticated() {
    let app = TestApp::spawn().await;

    let resp = app.client.get("/api/auth/whoami").send().await;
    let (status, body) = read_json(resp).await;

    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_tampered_token_is_unauthenticated() {
    let app = TestApp::spawn().await;
    let (_, token) = app.token_for("kim", Role::DataEntry).await;

    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let resp = app
        .client
        .get("/api/auth/whoami")
        .header("Authorization", bearer(&tampered))
        .send()
        .await;
    assert_eq!(read_json(resp).await.0, 401);
}

#[tokio::test]
async fn test_admin_on_super_admin_route_discloses_roles() {
    let app = TestApp::spawn().await;
    let (_, token) = app.token_for("leo", Role::Admin).await;

    let resp = app
        .client
        .get("/api/auth/permission-requests")
        .header("Authorization", bearer(&token))
        .send()
        .await;
    let (status, body) = read_json(resp).await;

    assert_eq!(status, 403);
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["required_roles"], json!(["SuperAdmin"]));
    assert_eq!(body["user_role"], "Admin");
}

#[tokio::test]
async fn test_alice_end_to_end() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post("/api/auth/register")
        .body_json(&json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "pw12345678",
            "role": "DataEntry",
        }))
        .send()
        .await;
    assert_eq!(read_json(resp).await.0, 201);

    let verification = app.notifier.last_verification_token("alice@example.com").unwrap();
    app.client
        .post("/api/auth/verify-email")
        .body_json(&json!({ "token": verification }))
        .send()
        .await
        .assert_status_is_ok();

    let token = app.login("alice", "pw12345678").await;
    let claims = app.app_data.tokens.verify(&token).unwrap();
    assert_eq!(claims.role, Role::DataEntry);
    assert!(claims.email_verified);

    let resp = app
        .client
        .get("/api/admin/users/anyone")
        .header("Authorization", bearer(&token))
        .send()
        .await;
    let (status, body) = read_json(resp).await;
    assert_eq!(status, 403);
    assert_eq!(body["required_roles"], json!(["SuperAdmin", "Admin"]));
    assert_eq!(body["user_role"], "DataEntry");
}

#[tokio::test]
async fn test_role_change_applies_after_new_login() {
    let app = TestApp::spawn().await;
    let (_, boss_token) = app.token_for("boss", Role::SuperAdmin).await;
    let (clerk, clerk_token) = app.token_for("clerk", Role::DataEntry).await;

    app.client
        .put(format!("/api/admin/users/{}/role", clerk.id))
        .header("Authorization", bearer(&boss_token))
        .body_json(&json!({ "role": "Admin" }))
        .send()
        .await
        .assert_status_is_ok();

    // The old token still carries DataEntry
    let stale = app
        .client
        .get(format!("/api/admin/users/{}", clerk.id))
        .header("Authorization", bearer(&clerk_token))
        .send()
        .await;
    assert_eq!(read_json(stale).await.0, 403);

    let fresh_token = app.login("clerk", common::PASSWORD).await;
    let fresh = app
        .client
        .get(format!("/api/admin/users/{}", clerk.id))
        .header("Authorization", bearer(&fresh_token))
        .send()
        .await;
    let (status, body) = read_json(fresh).await;
    assert_eq!(status, 200);
    assert_eq!(body["role"], "Admin");
}

#[tokio::test]
async fn test_last_super_admin_cannot_demote_self() {
    let app = TestApp::spawn().await;
    let (boss, token) = app.token_for("boss", Role::SuperAdmin).await;

    let resp = app
        .client
        .put(format!("/api/admin/users/{}/role", boss.id))
        .header("Authorization", bearer(&token))
        .body_json(&json!({ "role": "Admin" }))
        .send()
        .await;
    let (status, body) = read_json(resp).await;

    assert_eq!(status, 409);
    assert_eq!(body["error"], "last_super_admin");
}

#[tokio::test]
async fn test_health_is_public_and_reports_databases() {
    let app = TestApp::spawn().await;

    let resp = app.client.get("/api/health").send().await;
    let (status, body) = read_json(resp).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["auth_database"], "up");
    assert_eq!(body["audit_database"], "up");
}
