//! Session cookie contract.
//!
//! Two cookies carry the session: the short-lived access token and the
//! longer-lived refresh token. Attributes are fixed policy, not
//! per-call options: HttpOnly, SameSite=None, Path=/, Max-Age derived
//! from the configured TTLs, and Secure outside localhost development.

use axum::http::{HeaderMap, header};

use crate::jwt::{ACCESS_TOKEN_TTL_MINUTES, REFRESH_TOKEN_TTL_MINUTES, SessionTokenPair};

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// The token pair read from request cookies. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Builds and reads the fixed-policy session cookies.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    /// `secure` controls the Secure attribute only; everything else is
    /// fixed. Tests and localhost run with `secure = false`.
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Read both session cookies from a request.
    pub fn read_tokens(&self, headers: &HeaderMap) -> SessionTokens {
        SessionTokens {
            access_token: get_cookie(headers, ACCESS_COOKIE_NAME).map(str::to_string),
            refresh_token: get_cookie(headers, REFRESH_COOKIE_NAME).map(str::to_string),
        }
    }

    fn attributes(&self, max_age_secs: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "; HttpOnly; SameSite=None; Path=/; Max-Age={}{}",
            max_age_secs, secure
        )
    }

    /// Set-Cookie values installing a freshly issued session. The access
    /// cookie expires with the access TTL, the refresh cookie with the
    /// refresh TTL.
    pub fn issue_session(&self, tokens: &SessionTokenPair) -> [String; 2] {
        [
            format!(
                "{}={}{}",
                ACCESS_COOKIE_NAME,
                tokens.access_token,
                self.attributes(ACCESS_TOKEN_TTL_MINUTES * 60)
            ),
            format!(
                "{}={}{}",
                REFRESH_COOKIE_NAME,
                tokens.refresh_token,
                self.attributes(REFRESH_TOKEN_TTL_MINUTES * 60)
            ),
        ]
    }

    /// Set-Cookie values expiring both session cookies. Safe to apply
    /// more than once; the end state is the same.
    pub fn clear_session(&self) -> [String; 2] {
        [
            format!("{}={}", ACCESS_COOKIE_NAME, self.attributes(0)),
            format!("{}={}", REFRESH_COOKIE_NAME, self.attributes(0)),
        ]
    }
}
