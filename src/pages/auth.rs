//! Login, registration, access requests, logout.
//!
//! Registration is a first-run bootstrap: it only creates the initial
//! administrator. Once an admin exists, new users go through the
//! request-access flow and wait for approval.

use axum::{
    Extension, Form, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{PageError, ResultExt, redirect_with_flash, render_page};
use crate::AppState;
use crate::auth::{DASHBOARD_PATH, FlashMessage, HasAuthBackend, LOGIN_PATH, MaybeUser};
use crate::db::{DbSession, User};
use crate::jwt::SessionTokenPair;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/request-access", get(request_access_page).post(request_access))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterForm {
    email: String,
    password: String,
    confirm_password: String,
}

/// 303 to the dashboard with a fresh session installed in cookies.
fn session_redirect(state: &AppState, tokens: &SessionTokenPair, message: &str) -> Response {
    let mut response = redirect_with_flash(DASHBOARD_PATH, FlashMessage::success(message));
    for cookie in state.session_cookies().issue_session(tokens) {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Redirect register/login traffic to whichever bootstrap step applies.
/// Returns None when the requested page should render.
async fn bootstrap_redirect(db: &DbSession, on_register_page: bool) -> Result<Option<Response>, PageError> {
    let admins = db.count_admins().await.db_err("Failed to count admins")?;

    if on_register_page && admins > 0 {
        return Ok(Some(redirect_with_flash(
            "/auth/request-access",
            FlashMessage::info(
                "Request access to the monitoring dashboard or login to your account",
            ),
        )));
    }
    if !on_register_page && admins == 0 {
        return Ok(Some(redirect_with_flash(
            "/auth/register",
            FlashMessage::info("No account found. Please register to continue"),
        )));
    }
    Ok(None)
}

async fn login_page(
    Extension(db): Extension<DbSession>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(redirect) = bootstrap_redirect(&db, false).await? {
        return Ok(redirect);
    }
    Ok(render_page(&headers, json!({ "page": "auth/login" })))
}

async fn login(
    State(state): State<AppState>,
    Extension(db): Extension<DbSession>,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    if let Some(redirect) = bootstrap_redirect(&db, false).await? {
        return Ok(redirect);
    }

    let failed = || redirect_with_flash(LOGIN_PATH, FlashMessage::error("Invalid email or password"));

    let Some(user) = db
        .find_user_by_email(&form.email)
        .await
        .db_err("Failed to look up user")?
    else {
        return Ok(failed());
    };

    let password_ok = bcrypt::verify(&form.password, &user.password_hash)
        .map_err(|e| PageError::db_error("Failed to verify password", e))?;
    if !password_ok {
        return Ok(failed());
    }

    if !user.is_active || !user.is_approved {
        return Ok(redirect_with_flash(
            LOGIN_PATH,
            FlashMessage::error("Your account is awaiting approval"),
        ));
    }

    let tokens = state
        .jwt
        .issue_session(&user.id)
        .map_err(|e| PageError::db_error("Failed to issue session", e))?;

    info!(email = %user.email, "User logged in");
    Ok(session_redirect(&state, &tokens, "Logged in successfully"))
}

async fn register_page(
    Extension(db): Extension<DbSession>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(redirect) = bootstrap_redirect(&db, true).await? {
        return Ok(redirect);
    }
    Ok(render_page(&headers, json!({ "page": "auth/register" })))
}

/// First-run bootstrap: creates the initial administrator and logs them
/// straight in.
async fn register(
    State(state): State<AppState>,
    Extension(db): Extension<DbSession>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    if let Some(redirect) = bootstrap_redirect(&db, true).await? {
        return Ok(redirect);
    }

    if let Some(response) = validate_credentials(&form.email, &form.password, &form.confirm_password, "/auth/register") {
        return Ok(response);
    }

    let user = new_user(&form.email, &form.password, true)?;
    if create_unless_taken(&db, &user).await?.is_some() {
        return Ok(redirect_with_flash(
            "/auth/register",
            FlashMessage::error("Email already in use"),
        ));
    }

    let tokens = state
        .jwt
        .issue_session(&user.id)
        .map_err(|e| PageError::db_error("Failed to issue session", e))?;

    info!(email = %user.email, "Admin account created");
    Ok(session_redirect(&state, &tokens, "Signed up successfully"))
}

async fn request_access_page(
    Extension(db): Extension<DbSession>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    if let Some(redirect) = empty_store_redirect(&db).await? {
        return Ok(redirect);
    }
    Ok(render_page(&headers, json!({ "page": "auth/request-access" })))
}

/// Creates an inactive, unapproved account awaiting admin approval. No
/// session is issued.
async fn request_access(
    Extension(db): Extension<DbSession>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, PageError> {
    if let Some(redirect) = empty_store_redirect(&db).await? {
        return Ok(redirect);
    }

    if let Some(response) = validate_credentials(&form.email, &form.password, &form.confirm_password, "/auth/request-access") {
        return Ok(response);
    }

    let user = new_user(&form.email, &form.password, false)?;
    if create_unless_taken(&db, &user).await?.is_some() {
        return Ok(redirect_with_flash(
            "/auth/request-access",
            FlashMessage::error("Email already in use"),
        ));
    }

    info!(email = %user.email, "Access request made");
    Ok(redirect_with_flash(
        "/auth/request-access",
        FlashMessage::success("Access request made successfully"),
    ))
}

/// Clears both session cookies and returns to login. Works off the
/// outcome the middleware attached earlier in this request; an expired
/// or missing token still logs out.
async fn logout(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    if let Some(user) = user {
        info!(email = %user.email, "User logged out");
    }

    let mut response = Redirect::to(LOGIN_PATH).into_response();
    for cookie in state.session_cookies().clear_session() {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Redirect to registration when the user table is still empty.
async fn empty_store_redirect(db: &DbSession) -> Result<Option<Response>, PageError> {
    let count = db.count_users().await.db_err("Failed to count users")?;
    if count == 0 {
        return Ok(Some(redirect_with_flash(
            "/auth/register",
            FlashMessage::info("No account found. Please register to continue"),
        )));
    }
    Ok(None)
}

fn validate_credentials(
    email: &str,
    password: &str,
    confirm_password: &str,
    back_to: &str,
) -> Option<Response> {
    if email.is_empty() || !email.contains('@') {
        return Some(redirect_with_flash(
            back_to,
            FlashMessage::error("A valid email address is required"),
        ));
    }
    if password.len() < 8 {
        return Some(redirect_with_flash(
            back_to,
            FlashMessage::error("Password must be at least 8 characters"),
        ));
    }
    if password != confirm_password {
        return Some(redirect_with_flash(
            back_to,
            FlashMessage::error("Passwords do not match"),
        ));
    }
    None
}

fn new_user(email: &str, password: &str, admin: bool) -> Result<User, PageError> {
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| PageError::db_error("Failed to hash password", e))?;
    Ok(User {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash,
        is_active: admin,
        is_approved: admin,
        is_admin: admin,
    })
}

/// Insert the user, mapping a uniqueness violation to `Some(())` so the
/// caller can flash instead of failing the request.
async fn create_unless_taken(db: &DbSession, user: &User) -> Result<Option<()>, PageError> {
    let existing = db
        .find_user_by_email(&user.email)
        .await
        .db_err("Failed to check email")?;
    if existing.is_some() {
        return Ok(Some(()));
    }
    db.create_user(user).await.db_err("Failed to create user")?;
    Ok(None)
}
