//! JWT session token issuance and verification.
//!
//! Dual-token sessions: a short-lived access token verified on every
//! request and a longer-lived refresh token. Both are opaque bearer
//! strings carried in cookies. Verification is pure: it takes the
//! current time explicitly and never touches the database.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access token lifetime in minutes.
pub const ACCESS_TOKEN_TTL_MINUTES: u64 = 30;

/// Refresh token lifetime in minutes. Must stay strictly greater than the
/// access TTL; the cookie manager issues both with these horizons.
pub const REFRESH_TOKEN_TTL_MINUTES: u64 = 7 * 24 * 60;

/// Token type claim, distinguishing access from refresh tokens so one can
/// never be presented in place of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A verified identity reference decoded from an access token.
/// Only `JwtConfig::verify_access_token` produces these.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Stable user id from the token subject.
    pub user_id: String,
    /// Token expiry instant (Unix timestamp).
    pub expires_at: u64,
}

/// The access/refresh pair minted at login or registration.
#[derive(Debug, Clone)]
pub struct SessionTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Key material for signing and verifying session tokens.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a fresh access/refresh pair for a user.
    pub fn issue_session(&self, user_id: &str) -> Result<SessionTokenPair, IssueError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| IssueError::Clock)?
            .as_secs();

        let access = SessionClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_MINUTES * 60,
        };
        let refresh = SessionClaims {
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + REFRESH_TOKEN_TTL_MINUTES * 60,
        };

        let access_token = jsonwebtoken::encode(&Header::default(), &access, &self.encoding_key)
            .map_err(IssueError::Encoding)?;
        let refresh_token = jsonwebtoken::encode(&Header::default(), &refresh, &self.encoding_key)
            .map_err(IssueError::Encoding)?;

        Ok(SessionTokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify an access token against the given instant.
    ///
    /// Expiry is exclusive: a token whose `exp` equals `now` is already
    /// expired. Signature and shape problems are reported as distinct
    /// variants so callers can log them apart, though the middleware
    /// treats them all as "no principal".
    pub fn verify_access_token(&self, token: &str, now: u64) -> Result<Principal, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked below against the caller-supplied clock.
        validation.validate_exp = false;

        let token_data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
                |e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        VerifyError::SignatureInvalid
                    }
                    _ => VerifyError::Malformed,
                },
            )?;

        let claims = token_data.claims;
        if claims.token_type != TokenType::Access {
            return Err(VerifyError::Malformed);
        }
        if now >= claims.exp {
            return Err(VerifyError::Expired);
        }

        Ok(Principal {
            user_id: claims.sub,
            expires_at: claims.exp,
        })
    }
}

/// Errors minting a token pair.
#[derive(Debug)]
pub enum IssueError {
    Encoding(jsonwebtoken::errors::Error),
    Clock,
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            IssueError::Clock => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for IssueError {}

/// Typed verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Undecodable token, missing claims, or wrong token type.
    Malformed,
    /// Structurally valid but past its expiry instant.
    Expired,
    /// Signature does not match the signing material.
    SignatureInvalid,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::Malformed => write!(f, "Malformed token"),
            VerifyError::Expired => write!(f, "Expired token"),
            VerifyError::SignatureInvalid => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for VerifyError {}
