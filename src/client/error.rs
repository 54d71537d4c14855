//! Pipeline and refresh error types

use crate::domain_port::{AuthServerError, TokenStoreError};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Why a refresh cycle failed. Cloned to every request that waited on it.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("refresh exchange timed out after {0:?}")]
    Timeout(Duration),
    #[error("refresh exchange failed: {0}")]
    Transport(String),
    #[error("token store error: {0}")]
    Store(String),
    #[error("refresh was abandoned before it settled")]
    Abandoned,
}

impl From<AuthServerError> for RefreshError {
    fn from(error: AuthServerError) -> Self {
        match error {
            AuthServerError::Rejected { status, message } => {
                RefreshError::Rejected { status, message }
            }
            AuthServerError::Transport(e) => RefreshError::Transport(e),
            AuthServerError::Decode(e) => RefreshError::Transport(e),
        }
    }
}

impl From<TokenStoreError> for RefreshError {
    fn from(error: TokenStoreError) -> Self {
        RefreshError::Store(error.to_string())
    }
}

/// Outcome of a request that did not produce a successful response.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Access token rejected; handled inside the pipeline.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// The session could not be refreshed and has been torn down.
    #[error("session expired: {0}")]
    RefreshExpired(#[source] RefreshError),

    /// A request replayed after a refresh was rejected again.
    #[error("request rejected again after token refresh")]
    RetryExhausted,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("http error {status}: {message}")]
    Status { status: u16, message: String },

    /// No response was received, or the request could not be built.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HttpError {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthExpired(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            503 => Self::Unavailable(message),
            500..=599 => Self::Server {
                status: status.as_u16(),
                message,
            },
            _ => Self::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// True when the session was torn down as a result of this error.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Self::RefreshExpired(_) | Self::RetryExhausted)
    }
}

/// Picks a human-readable message out of an error body, falling back to the
/// status reason.
pub fn message_from_body(status: StatusCode, body: &[u8]) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return fallback();
    };
    value
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| value.pointer("/error/message").and_then(|m| m.as_str()))
        .map(str::to_string)
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_variants() {
        let err = |code: u16| HttpError::from_status(StatusCode::from_u16(code).unwrap(), "m".into());
        assert!(matches!(err(400), HttpError::BadRequest(_)));
        assert!(matches!(err(401), HttpError::AuthExpired(_)));
        assert!(matches!(err(403), HttpError::Forbidden(_)));
        assert!(matches!(err(404), HttpError::NotFound(_)));
        assert!(matches!(err(500), HttpError::Server { status: 500, .. }));
        assert!(matches!(err(503), HttpError::Unavailable(_)));
        assert!(matches!(err(418), HttpError::Status { status: 418, .. }));
    }

    #[test]
    fn message_is_read_from_body() {
        let body = br#"{"success":false,"message":"token expired"}"#;
        assert_eq!(message_from_body(StatusCode::UNAUTHORIZED, body), "token expired");

        let nested = br#"{"error":{"code":"Forbidden","message":"admins only"}}"#;
        assert_eq!(message_from_body(StatusCode::FORBIDDEN, nested), "admins only");

        assert_eq!(message_from_body(StatusCode::NOT_FOUND, b"<html>"), "Not Found");
    }
}
