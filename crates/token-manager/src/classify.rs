//! Refresh failure classification
//!
//! Distinguishes a rejected refresh token (`invalid_grant`) from every other
//! exchange failure. Only an invalid grant triggers the downgrade to the
//! client-credentials flow; everything else is surfaced to the caller.

use oauth_auth::{Error, INVALID_GRANT};

/// How a failed refresh-token exchange should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Provider no longer honors the refresh token: drop it, fall back once
    InvalidGrant,
    /// Network, 5xx, other 4xx, malformed response: surface as-is
    Other,
}

/// Whether an HTTP error response means the presented refresh token was rejected.
///
/// Identity providers answer 400 (sometimes 401) with a JSON body whose
/// `error` field is `invalid_grant`. Bodies that are not JSON are matched
/// on the bare error code.
pub fn is_invalid_grant(status: u16, body: &str) -> bool {
    if status != 400 && status != 401 {
        return false;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|code| code == INVALID_GRANT),
        Err(_) => body.contains(INVALID_GRANT),
    }
}

/// Classify the error from a refresh-token exchange.
pub fn classify_refresh_error(err: &Error) -> RefreshFailure {
    match err {
        Error::Http { status, body } if is_invalid_grant(*status, body) => {
            RefreshFailure::InvalidGrant
        }
        _ => RefreshFailure::Other,
    }
}
