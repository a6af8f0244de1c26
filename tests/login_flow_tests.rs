//! Tests for login, registration, access requests and logout.
//!
//! Tests cover:
//! - First-run bootstrap: empty store steers everything to registration
//! - Registration creating the initial admin and logging them in
//! - Password login issuing both session cookies
//! - Unapproved accounts kept out with a flash
//! - Access requests creating pending accounts without a session
//! - Logout clearing both cookies regardless of token state

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{
    TEST_SECRET, access_cookie, auth_cookies, create_test_app, extract_set_cookies, flash_cookies,
    has_cleared_cookie, seed_pending_user, seed_user, set_cookie_value,
};
use opsdash::jwt::{ACCESS_TOKEN_TTL_MINUTES, JwtConfig, REFRESH_TOKEN_TTL_MINUTES};
use tower::ServiceExt;

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =============================================================================
// Bootstrap Flow
// =============================================================================

#[tokio::test]
async fn test_login_page_on_empty_store_redirects_to_register() {
    let (app, _db) = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/register"
    );
}

#[tokio::test]
async fn test_register_page_redirects_once_admin_exists() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "admin@example.com", "password123", true).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/register")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/request-access"
    );
}

#[tokio::test]
async fn test_register_creates_admin_and_logs_in() {
    let (app, db) = create_test_app().await;

    let response = app
        .oneshot(form_post(
            "/auth/register",
            "email=admin@example.com&password=password123&confirm_password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/dashboard"
    );

    let cookies = extract_set_cookies(&response);
    assert!(set_cookie_value(&cookies, "access_token").is_some());
    assert!(set_cookie_value(&cookies, "refresh_token").is_some());

    let user = db
        .users()
        .get_by_email("admin@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.is_admin);
    assert!(user.is_active);
    assert!(user.is_approved);
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let (app, db) = create_test_app().await;

    let response = app
        .oneshot(form_post(
            "/auth/register",
            "email=admin@example.com&password=password123&confirm_password=different1",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/register"
    );
    assert_eq!(db.users().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let (app, db) = create_test_app().await;

    let response = app
        .oneshot(form_post(
            "/auth/register",
            "email=admin@example.com&password=short&confirm_password=short",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(db.users().count().await.unwrap(), 0);
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_issues_both_session_cookies() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            "email=alice@example.com&password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/dashboard"
    );

    let cookies = extract_set_cookies(&response);
    let access = cookies
        .iter()
        .find(|c| c.starts_with("access_token="))
        .expect("access cookie set");
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .expect("refresh cookie set");

    assert!(access.contains(&format!("Max-Age={}", ACCESS_TOKEN_TTL_MINUTES * 60)));
    assert!(refresh.contains(&format!("Max-Age={}", REFRESH_TOKEN_TTL_MINUTES * 60)));
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("SameSite=None"));
    // secure_cookies is off in tests.
    assert!(!access.contains("Secure"));
}

#[tokio::test]
async fn test_issued_cookie_opens_protected_page() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let login = app
        .clone()
        .oneshot(form_post(
            "/auth/login",
            "email=alice@example.com&password=password123",
        ))
        .await
        .unwrap();
    let cookies = extract_set_cookies(&login);
    let access = set_cookie_value(&cookies, "access_token").unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dashboard")
                .header(header::COOKIE, access_cookie(&access))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password_flashes_generic_error() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            "email=alice@example.com&password=wrong-password",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );

    let cookies = extract_set_cookies(&response);
    assert_eq!(flash_cookies(&cookies).len(), 1);
    assert!(set_cookie_value(&cookies, "access_token").is_none());
}

#[tokio::test]
async fn test_login_unknown_email_flashes_generic_error() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            "email=nobody@example.com&password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );
}

#[tokio::test]
async fn test_unapproved_account_cannot_login() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "admin@example.com", "password123", true).await;
    seed_pending_user(&db, "pending@example.com", "password123").await;

    let response = app
        .oneshot(form_post(
            "/auth/login",
            "email=pending@example.com&password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );

    let cookies = extract_set_cookies(&response);
    assert!(set_cookie_value(&cookies, "access_token").is_none());
    assert!(set_cookie_value(&cookies, "refresh_token").is_none());
}

// =============================================================================
// Access Requests
// =============================================================================

#[tokio::test]
async fn test_request_access_creates_pending_account() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "admin@example.com", "password123", true).await;

    let response = app
        .oneshot(form_post(
            "/auth/request-access",
            "email=bob@example.com&password=password123&confirm_password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/request-access"
    );

    // No session is issued for a pending request.
    let cookies = extract_set_cookies(&response);
    assert!(set_cookie_value(&cookies, "access_token").is_none());

    let user = db
        .users()
        .get_by_email("bob@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_active);
    assert!(!user.is_approved);
    assert!(!user.is_admin);
}

#[tokio::test]
async fn test_request_access_duplicate_email_flashes() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "admin@example.com", "password123", true).await;
    seed_user(&db, "bob@example.com", "password123", false).await;

    let response = app
        .oneshot(form_post(
            "/auth/request-access",
            "email=bob@example.com&password=password123&confirm_password=password123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(flash_cookies(&extract_set_cookies(&response)).len(), 1);
    assert_eq!(db.users().count().await.unwrap(), 2);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let (app, db) = create_test_app().await;
    let user = seed_user(&db, "alice@example.com", "password123", true).await;

    let jwt = JwtConfig::new(TEST_SECRET);
    let tokens = jwt.issue_session(&user.id).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(
                    header::COOKIE,
                    auth_cookies(&tokens.access_token, &tokens.refresh_token),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );

    let cookies = extract_set_cookies(&response);
    assert!(has_cleared_cookie(&cookies, "access_token"));
    assert!(has_cleared_cookie(&cookies, "refresh_token"));
}

#[tokio::test]
async fn test_logout_without_session_still_clears() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );

    let cookies = extract_set_cookies(&response);
    assert!(has_cleared_cookie(&cookies, "access_token"));
    assert!(has_cleared_cookie(&cookies, "refresh_token"));
}

#[tokio::test]
async fn test_logout_with_garbage_token_still_clears() {
    let (app, db) = create_test_app().await;
    seed_user(&db, "alice@example.com", "password123", true).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(header::COOKIE, "access_token=broken; refresh_token=broken")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let cookies = extract_set_cookies(&response);
    assert!(has_cleared_cookie(&cookies, "access_token"));
    assert!(has_cleared_cookie(&cookies, "refresh_token"));
}
