use thiserror::Error;

/// Every variant means the token is malformed for session purposes and is
/// treated like an expired one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidTokenFormat,

    #[error("Invalid token header: {0}")]
    InvalidHeader(String),

    #[error("Base64 decoding failed: {0}")]
    Base64(String),

    #[error("Invalid token payload: {0}")]
    InvalidPayload(String),

    #[error("Token has no exp claim")]
    MissingExpiry,

    #[error("Token exp claim out of range: {0}")]
    InvalidExpiry(String),
}

impl From<base64::DecodeError> for TokenError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64(err.to_string())
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}
