mod common;

use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{TestApp, OWNER_PASSWORD};

#[tokio::test]
async fn test_guest_can_be_upgraded() {
    let app = TestApp::spawn().await;

    let guest = app
        .expect(Method::POST, "/api/users", None, None, StatusCode::CREATED)
        .await;
    assert_eq!(guest["user"]["role"], "guest");
    let guest_id = guest["user"]["id"].clone();
    let guest_token = guest["token"].as_str().unwrap().to_string();

    let upgraded = app
        .expect(
            Method::POST,
            "/api/auth/register",
            Some(guest_token.as_str()),
            Some(&json!({
                "username": "former_guest",
                "email": "guest@example.com",
                "password": "password-123"
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(upgraded["user"]["id"], guest_id);
    assert_eq!(upgraded["user"]["role"], "user");
    assert!(upgraded["user"].get("password").is_none());

    // The guest token names a role the account no longer has.
    app.expect(
        Method::GET,
        "/api/users/self",
        Some(guest_token.as_str()),
        None,
        StatusCode::UNAUTHORIZED,
    )
    .await;

    let token = upgraded["token"].as_str().unwrap();
    let me = app
        .expect(Method::GET, "/api/users/self", Some(token), None, StatusCode::OK)
        .await;
    assert_eq!(me["username"], "former_guest");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let app = TestApp::spawn().await;
    app.register("baker").await;

    app.expect(
        Method::POST,
        "/api/auth/register",
        None,
        Some(&json!({
            "username": "baker",
            "email": "other@example.com",
            "password": "password-123"
        })),
        StatusCode::CONFLICT,
    )
    .await;
    app.expect(
        Method::POST,
        "/api/auth/register",
        None,
        Some(&json!({
            "username": "b b",
            "email": "not-an-email",
            "password": "short"
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn test_login_by_username_or_email() {
    let app = TestApp::spawn().await;
    app.register("pastry_chef").await;

    app.login("pastry_chef", "password-123").await;
    app.login("pastry_chef@example.com", "password-123").await;

    let body = app
        .expect(
            Method::POST,
            "/api/auth/login",
            None,
            Some(&json!({ "identifier": "pastry_chef", "password": "wrong-password" })),
            StatusCode::UNAUTHORIZED,
        )
        .await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let app = TestApp::spawn().await;

    app.expect(Method::GET, "/api/users/self", None, None, StatusCode::UNAUTHORIZED)
        .await;
    app.expect(
        Method::GET,
        "/api/users/self",
        Some("not-a-token"),
        None,
        StatusCode::UNAUTHORIZED,
    )
    .await;
}

#[tokio::test]
async fn test_users_only_see_themselves() {
    let app = TestApp::spawn().await;
    let (alice, alice_token) = app.register("alice").await;
    let (bob, _) = app.register("bobby").await;

    app.expect(
        Method::GET,
        &format!("/api/users/{alice}"),
        Some(alice_token.as_str()),
        None,
        StatusCode::OK,
    )
    .await;
    app.expect(
        Method::GET,
        &format!("/api/users/{bob}"),
        Some(alice_token.as_str()),
        None,
        StatusCode::FORBIDDEN,
    )
    .await;
    app.expect(
        Method::PUT,
        &format!("/api/users/{bob}"),
        Some(alice_token.as_str()),
        Some(&json!({ "email": "stolen@example.com" })),
        StatusCode::FORBIDDEN,
    )
    .await;

    let updated = app
        .expect(
            Method::PUT,
            &format!("/api/users/{alice}"),
            Some(alice_token.as_str()),
            Some(&json!({ "email": "alice@bakery.com" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["email"], "alice@bakery.com");
}

#[tokio::test]
async fn test_only_the_owner_changes_roles() {
    let app = TestApp::spawn().await;
    let (staff, _) = app.register("staffer").await;
    let (customer, _) = app.register("customer").await;
    let owner = app
        .expect(
            Method::GET,
            "/api/users/self",
            Some(app.owner_token.as_str()),
            None,
            StatusCode::OK,
        )
        .await;

    let promoted = app
        .expect(
            Method::PUT,
            &format!("/api/users/{staff}"),
            Some(app.owner_token.as_str()),
            Some(&json!({ "role": "admin" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(promoted["role"], "admin");

    let admin_token = app.login("staffer", "password-123").await;
    app.expect(
        Method::PUT,
        &format!("/api/users/{customer}"),
        Some(admin_token.as_str()),
        Some(&json!({ "role": "admin" })),
        StatusCode::FORBIDDEN,
    )
    .await;
    // Admins may still edit other fields.
    app.expect(
        Method::PUT,
        &format!("/api/users/{customer}"),
        Some(admin_token.as_str()),
        Some(&json!({ "username": "customer_2" })),
        StatusCode::OK,
    )
    .await;

    app.expect(
        Method::PUT,
        &format!("/api/users/{}", owner["id"]),
        Some(app.owner_token.as_str()),
        Some(&json!({ "role": "user" })),
        StatusCode::FORBIDDEN,
    )
    .await;
    app.login("owner", OWNER_PASSWORD).await;
}

#[tokio::test]
async fn test_admin_lists_and_deletes_users() {
    let app = TestApp::spawn().await;
    let (victim, _) = app.register("leaving").await;
    app.register("staying").await;

    let body = app
        .expect(
            Method::GET,
            "/api/admin/users?role=user",
            Some(app.owner_token.as_str()),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["total"], 2);

    app.expect(
        Method::DELETE,
        &format!("/api/admin/users/{victim}"),
        Some(app.owner_token.as_str()),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;

    let body = app
        .expect(
            Method::GET,
            "/api/admin/users?username=leav",
            Some(app.owner_token.as_str()),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(body["total"], 0);
}
