//! Bearer token handling.
//!
//! Tokens are verified by the gateway in front of this service; here the JWT
//! payload is only decoded to read the subject claim.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// The authenticated user on whose behalf a handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token has no subject")]
    NoSubject,
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<serde_json::Value>,
}

/// Resolve the principal from an `Authorization` header value.
pub fn principal_from_header(header: Option<&str>) -> Result<Principal, AuthError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    let token = header
        .and_then(|h| {
            h.strip_prefix("Bearer ")
                .or_else(|| h.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Missing)?;
    principal_from_token(token)
}

/// Decode the payload segment of a JWT and read its `sub` claim.
pub fn principal_from_token(token: &str) -> Result<Principal, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::Malformed("expected three segments".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Malformed(e.to_string()))?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(e.to_string()))?;
    match claims.sub {
        Some(serde_json::Value::String(sub)) if !sub.is_empty() => Ok(Principal { user_id: sub }),
        _ => Err(AuthError::NoSubject),
    }
}

/// Build an unsigned token for a subject. Handy for the CLI and tests;
/// the signature segment is a placeholder.
pub fn unsigned_token(sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": sub }).to_string());
    format!("{}.{}.unsigned", header, payload)
}
