#![allow(dead_code)]

use axum::body::Body;
use opsdash::{ServerConfig, create_app, db::Database, db::User};

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-integration!";

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> (axum::Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: TEST_SECRET.to_vec(),
        secure_cookies: false,
    };
    (create_app(&config), db)
}

/// Insert an active, approved user with a bcrypt-hashed password.
pub async fn seed_user(db: &Database, email: &str, password: &str, admin: bool) -> User {
    // Minimum cost keeps the test suite fast.
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: bcrypt::hash(password, 4).unwrap(),
        is_active: true,
        is_approved: true,
        is_admin: admin,
    };
    db.users().create(&user).await.unwrap();
    user
}

/// Insert a user still awaiting approval.
pub async fn seed_pending_user(db: &Database, email: &str, password: &str) -> User {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: bcrypt::hash(password, 4).unwrap(),
        is_active: false,
        is_approved: false,
        is_admin: false,
    };
    db.users().create(&user).await.unwrap();
    user
}

pub fn access_cookie(access_token: &str) -> String {
    format!("access_token={}", access_token)
}

pub fn auth_cookies(access_token: &str, refresh_token: &str) -> String {
    format!(
        "access_token={}; refresh_token={}",
        access_token, refresh_token
    )
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// The subset of cookies carrying a queued (not cleared) flash message.
pub fn flash_cookies(cookies: &[String]) -> Vec<String> {
    cookies
        .iter()
        .filter(|c| c.starts_with("flash=") && !c.contains("Max-Age=0"))
        .cloned()
        .collect()
}

/// Check if cookies contain a token being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Find the value of a freshly set cookie, ignoring cleared ones.
pub fn set_cookie_value(cookies: &[String], cookie_name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (name, rest) = c.split_once('=')?;
        if name != cookie_name || c.contains("Max-Age=0") {
            return None;
        }
        Some(rest.split(';').next().unwrap_or("").to_string())
    })
}

/// Read the response body as JSON.
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
