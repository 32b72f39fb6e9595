use axum::http::{header, HeaderMap};

use hustleflow_types::error::BoardError;

use crate::error::ApiError;

/// Session token from the Authorization header, if any. The token is an
/// opaque credential; matching it against owner/admin tokens is the
/// repository's job.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub fn require_token(headers: &HeaderMap) -> Result<String, ApiError> {
    bearer_token(headers)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or(ApiError(BoardError::IdentityRequired))
}
