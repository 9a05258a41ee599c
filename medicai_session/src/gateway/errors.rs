use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("Unable to connect to the server: {0}")]
    NetworkUnreachable(String),

    /// Non-success response, with the backend's detail message when it sent one.
    #[error("Request failed ({status}): {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkUnreachable(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
