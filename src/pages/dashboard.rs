//! Dashboard pages. All of these paths are in the protected route set;
//! the middleware guarantees a current user before any handler runs.

use axum::{
    Extension, Router,
    http::HeaderMap,
    response::Response,
    routing::get,
};
use serde_json::{Value, json};

use super::{PageError, ResultExt, render_page};
use crate::auth::CurrentUser;
use crate::db::{DbSession, User};

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/alerts", get(alerts))
        .route("/processes", get(processes))
        .route("/notifications", get(notifications))
        .route("/users", get(user_list))
        .route("/settings", get(settings))
}

fn identity(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "is_admin": user.is_admin,
    })
}

async fn index(headers: HeaderMap, CurrentUser(user): CurrentUser) -> Response {
    render_page(
        &headers,
        json!({ "page": "dashboard/index", "user": identity(&user) }),
    )
}

async fn alerts(headers: HeaderMap, CurrentUser(user): CurrentUser) -> Response {
    render_page(
        &headers,
        json!({ "page": "dashboard/alerts", "user": identity(&user) }),
    )
}

async fn processes(headers: HeaderMap, CurrentUser(user): CurrentUser) -> Response {
    render_page(
        &headers,
        json!({ "page": "dashboard/processes", "user": identity(&user) }),
    )
}

async fn notifications(headers: HeaderMap, CurrentUser(user): CurrentUser) -> Response {
    render_page(
        &headers,
        json!({ "page": "dashboard/notifications", "user": identity(&user) }),
    )
}

async fn user_list(
    Extension(db): Extension<DbSession>,
    headers: HeaderMap,
    CurrentUser(user): CurrentUser,
) -> Result<Response, PageError> {
    let users = db.list_users().await.db_err("Failed to list users")?;
    Ok(render_page(
        &headers,
        json!({
            "page": "dashboard/users",
            "user": identity(&user),
            "users": users,
        }),
    ))
}

async fn settings(headers: HeaderMap, CurrentUser(user): CurrentUser) -> Response {
    render_page(
        &headers,
        json!({ "page": "dashboard/settings", "user": identity(&user) }),
    )
}
