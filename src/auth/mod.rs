//! Cookie-session authentication.
//!
//! Dual-token sessions carried in cookies, a static route-class table,
//! and the middleware that ties them together: classify, read cookies,
//! verify, resolve identity, decide.

pub mod flash;
mod middleware;
mod policy;
mod session;

pub use flash::{FlashMessage, Severity};
pub use middleware::{
    CurrentUser, HasAuthBackend, LOGIN_REQUIRED_MESSAGE, MaybeUser, RequestAuthOutcome,
    authenticate, login_redirect,
};
pub use policy::{DASHBOARD_PATH, LOGIN_PATH, RouteClass, RouteTable, RouteTableError};
pub use session::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, SessionCookies, SessionTokens, get_cookie,
};
