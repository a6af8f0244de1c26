//! Page handlers.
//!
//! Rendering proper belongs to the frontend; these handlers return the
//! template context as JSON. Each rendered page consumes any pending
//! flash message exactly once; redirects queue flashes without
//! consuming them.

mod auth;
mod dashboard;
mod error;
mod users;

use axum::{
    Json, Router,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::{FlashMessage, flash};

pub use error::{PageError, ResultExt};

/// Assemble the page router.
pub fn create_page_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .nest("/auth", auth::router(state))
        .nest("/dashboard", dashboard::router())
        .nest("/users", users::router())
}

/// Render a page body, consuming the pending flash if one is queued.
pub(crate) fn render_page(headers: &HeaderMap, mut body: Value) -> Response {
    let pending = flash::peek(headers);
    if let Some(ref message) = pending {
        body["flash"] = json!(message);
    }

    let mut response = Json(body).into_response();
    if pending.is_some() {
        if let Ok(value) = HeaderValue::from_str(&flash::clear_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// 303 to `target` with a queued flash message.
pub(crate) fn redirect_with_flash(target: &str, message: FlashMessage) -> Response {
    let mut response = Redirect::to(target).into_response();
    if let Ok(value) = HeaderValue::from_str(&flash::set_cookie(&message)) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Landing page. Unauthenticated-only: the middleware bounces logged-in
/// callers to the dashboard before this runs, so it always renders
/// anonymous.
async fn index(headers: HeaderMap) -> Response {
    render_page(&headers, json!({ "page": "index" }))
}
