//! Per-request authentication policy.
//!
//! Every request is classified first, then driven through cookie read,
//! token verification and identity resolution, strictly in that order. A
//! public path with no session cookie never pays for verification. The
//! decision table keyed by (route class, principal present):
//!
//! - Protected without a principal: error flash + 303 to login.
//! - Protected with a principal: attach identity, run the handler.
//! - UnauthenticatedOnly with a principal: 303 to the dashboard, no flash.
//! - Everything else: attach the outcome and run the handler.
//!
//! Authentication failures never escape this layer; handlers only ever
//! see `Authenticated` or `Anonymous`. Store failures are different:
//! they surface as a 500 so an outage is never mistaken for a mass
//! logout.
//!
//! One persistence session is acquired per request and shared into the
//! request extensions; identity resolution and every handler query run
//! on that single connection.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::flash::{self, FlashMessage};
use super::policy::{DASHBOARD_PATH, LOGIN_PATH, RouteClass, RouteTable};
use super::session::SessionCookies;
use crate::db::{Database, DbSession, User};
use crate::jwt::{JwtConfig, VerifyError};

/// Flash text shown after any failed protected-route attempt. The same
/// message covers missing, invalid and orphaned tokens so the response
/// does not reveal which one it was.
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please login to access this page.";

/// What the middleware established for this request. Handlers depend on
/// this and never re-verify tokens themselves.
#[derive(Debug, Clone)]
pub enum RequestAuthOutcome {
    Authenticated(User),
    Anonymous,
}

/// State capabilities the middleware needs.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn routes(&self) -> &RouteTable;
    fn session_cookies(&self) -> SessionCookies;
}

/// Why no principal could be established. Kept for logging; routing
/// collapses all of these to "no principal".
enum NoPrincipal {
    TokenMissing,
    Verify(VerifyError),
    IdentityNotFound,
}

impl std::fmt::Display for NoPrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoPrincipal::TokenMissing => write!(f, "no access token"),
            NoPrincipal::Verify(e) => write!(f, "{}", e),
            NoPrincipal::IdentityNotFound => write!(f, "token subject no longer exists"),
        }
    }
}

fn unix_now() -> u64 {
    // A clock before the epoch fails closed: every token reads as expired.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX)
}

/// The authentication middleware. Applied to the whole router.
pub async fn authenticate<S>(State(state): State<S>, mut req: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    // Classification happens before any token work.
    let path = req.uri().path().to_string();
    let class = state.routes().classify(&path);

    let tokens = state.session_cookies().read_tokens(req.headers());

    // Scoped persistence handle for the whole request. A clone goes into
    // the request extensions so handler queries run on this same
    // connection; the connection returns to the pool when the last clone
    // drops, on every exit path including early redirects and
    // cancellation. A request never acquires a second connection, so
    // requests in flight can outnumber the pool without stalling.
    let db_session = match state.db().session().await {
        Ok(session) => session,
        Err(e) => return store_unavailable(e),
    };
    req.extensions_mut().insert(db_session.clone());

    let user = match tokens.access_token.as_deref() {
        None => {
            // The ordinary anonymous case; not an error.
            Err(NoPrincipal::TokenMissing)
        }
        Some(token) => match establish_principal(state.jwt(), token, &db_session).await {
            Ok(user) => Ok(user),
            Err(EstablishError::NoPrincipal(reason)) => {
                if matches!(reason, NoPrincipal::IdentityNotFound) {
                    // Token valid but the account is gone; worth telling
                    // apart from signature/expiry noise in the logs.
                    tracing::info!(%path, "valid token for deleted account");
                } else {
                    tracing::debug!(%path, reason = %reason, "session not established");
                }
                Err(reason)
            }
            Err(EstablishError::Store(e)) => return store_unavailable(e),
        },
    };

    match (class, user) {
        (RouteClass::Protected, Ok(user)) => {
            req.extensions_mut()
                .insert(RequestAuthOutcome::Authenticated(user));
            next.run(req).await
        }
        (RouteClass::Protected, Err(_)) => login_redirect(),
        (RouteClass::UnauthenticatedOnly, Ok(_)) => Redirect::to(DASHBOARD_PATH).into_response(),
        (RouteClass::UnauthenticatedOnly, Err(_)) => {
            req.extensions_mut().insert(RequestAuthOutcome::Anonymous);
            next.run(req).await
        }
        (RouteClass::Public, Ok(user)) => {
            req.extensions_mut()
                .insert(RequestAuthOutcome::Authenticated(user));
            next.run(req).await
        }
        (RouteClass::Public, Err(_)) => {
            req.extensions_mut().insert(RequestAuthOutcome::Anonymous);
            next.run(req).await
        }
    }
}

enum EstablishError {
    NoPrincipal(NoPrincipal),
    Store(sqlx::Error),
}

/// Verify the token and resolve the identity it names. Both stages must
/// succeed; a verified token whose subject no longer resolves grants
/// nothing.
async fn establish_principal(
    jwt: &JwtConfig,
    token: &str,
    db_session: &DbSession,
) -> Result<User, EstablishError> {
    let principal = jwt
        .verify_access_token(token, unix_now())
        .map_err(|e| EstablishError::NoPrincipal(NoPrincipal::Verify(e)))?;

    let user = db_session
        .find_user_by_id(&principal.user_id)
        .await
        .map_err(EstablishError::Store)?;

    user.ok_or(EstablishError::NoPrincipal(NoPrincipal::IdentityNotFound))
}

/// 303 to the login page with exactly one queued error flash. Cookies are
/// left untouched; only login and logout rewrite them.
pub fn login_redirect() -> Response {
    let mut response = Redirect::to(LOGIN_PATH).into_response();
    if let Ok(value) = HeaderValue::from_str(&flash::set_cookie(&FlashMessage::error(
        LOGIN_REQUIRED_MESSAGE,
    ))) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn store_unavailable(e: sqlx::Error) -> Response {
    tracing::error!(error = %e, "user store unavailable");
    (StatusCode::INTERNAL_SERVER_ERROR, "store unavailable").into_response()
}

/// Extractor for handlers that require the middleware-attached identity.
/// Rejects with the same flash + login redirect a protected page gives.
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestAuthOutcome>() {
            Some(RequestAuthOutcome::Authenticated(user)) => Ok(CurrentUser(user.clone())),
            _ => Err(login_redirect()),
        }
    }
}

/// Extractor for handlers that work with or without an identity.
pub struct MaybeUser(pub Option<User>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<RequestAuthOutcome>() {
            Some(RequestAuthOutcome::Authenticated(user)) => Some(user.clone()),
            _ => None,
        };
        Ok(MaybeUser(user))
    }
}
