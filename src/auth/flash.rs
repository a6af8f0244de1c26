//! One-shot flash messages.
//!
//! A flash is set on a redirect response and rendered exactly once by the
//! next page. It travels in its own cookie rather than server-side state,
//! so concurrent requests can never observe each other's messages: the
//! redirect carries the message out, the next render consumes it and
//! clears the cookie.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use super::session::get_cookie;

/// Cookie name for the pending flash message.
pub const FLASH_COOKIE_NAME: &str = "flash";

/// Message severity, mirrored in page payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A one-shot user notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub severity: Severity,
    pub text: String,
}

impl FlashMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

/// Set-Cookie value queueing a flash for the next render.
/// SameSite=Lax: the cookie only needs to survive a top-level redirect.
pub fn set_cookie(message: &FlashMessage) -> String {
    let payload = serde_json::to_vec(message).unwrap_or_default();
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        FLASH_COOKIE_NAME,
        URL_SAFE_NO_PAD.encode(payload)
    )
}

/// Set-Cookie value removing a consumed flash.
pub fn clear_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        FLASH_COOKIE_NAME
    )
}

/// Read the pending flash, if any. Undecodable payloads are dropped
/// silently; the caller clears the cookie either way.
pub fn peek(headers: &HeaderMap) -> Option<FlashMessage> {
    let raw = get_cookie(headers, FLASH_COOKIE_NAME)?;
    let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}
