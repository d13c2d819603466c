//! Bearer token extraction

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use thiserror::Error;

/// Authorization header problems
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("no token provided in Authorization header")]
    Missing,

    #[error("Authorization header is not valid ASCII")]
    NotAscii,

    #[error("token type missing in Authorization header")]
    MissingType,

    #[error("invalid token type {0}")]
    InvalidType(String),

    #[error("empty bearer token")]
    EmptyToken,
}

/// Returns the token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers.get(AUTHORIZATION).ok_or(BearerError::Missing)?;
    let value = value.to_str().map_err(|_| BearerError::NotAscii)?;
    if value.is_empty() {
        return Err(BearerError::Missing);
    }

    let (scheme, token) = value.split_once(' ').ok_or(BearerError::MissingType)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(BearerError::InvalidType(scheme.to_string()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(BearerError::EmptyToken);
    }
    Ok(token)
}
