use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::storage::StorageError;
use crate::token::TokenError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// `/auth/token` rejected the identifier/secret pair.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Transport-level failure; the session keeps its prior state.
    #[error("Unable to connect to the server: {0}")]
    NetworkUnreachable(String),

    /// Registration rejected by the backend.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Malformed token: {0}")]
    MalformedToken(#[from] TokenError),

    /// Any failure during refresh. The session has already been closed.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session token expired")]
    TokenExpired,

    /// A logout or newer login happened while this operation was in flight.
    #[error("Session changed while the operation was in flight")]
    Superseded,

    #[error("Backend error ({status}): {detail}")]
    Backend { status: u16, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Short classification used in logs in place of details that may carry user data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::Validation(_) => "validation",
            Self::MalformedToken(_) => "malformed_token",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::NotAuthenticated => "not_authenticated",
            Self::TokenExpired => "token_expired",
            Self::Superseded => "superseded",
            Self::Backend { .. } => "backend",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
        }
    }
}

/// Registration rejection, per field when the backend says which field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrors {
    Fields(BTreeMap<String, String>),
    Message(String),
}

impl ValidationErrors {
    /// Interpret a FastAPI-style error body.
    ///
    /// `{"detail": [{"loc": ["body", "field"], "msg": "..."}]}` maps each entry to
    /// its last `loc` element; `{"detail": "..."}` becomes a single message.
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        match body.get("detail")? {
            serde_json::Value::String(message) => Some(Self::Message(message.clone())),
            serde_json::Value::Array(entries) => {
                let mut fields: BTreeMap<String, String> = BTreeMap::new();
                for entry in entries {
                    let Some(msg) = entry.get("msg").and_then(|m| m.as_str()) else {
                        continue;
                    };
                    let field = match entry
                        .get("loc")
                        .and_then(|loc| loc.as_array())
                        .and_then(|loc| loc.last())
                    {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => "__root__".to_string(),
                    };
                    fields
                        .entry(field)
                        .and_modify(|existing| {
                            existing.push_str("; ");
                            existing.push_str(msg);
                        })
                        .or_insert_with(|| msg.to_string());
                }
                (!fields.is_empty()).then_some(Self::Fields(fields))
            }
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Fields(fields) => fields.get(name).map(String::as_str),
            Self::Message(_) => None,
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Fields(fields) => {
                let joined = fields
                    .iter()
                    .map(|(field, msg)| format!("{field}: {msg}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                f.write_str(&joined)
            }
        }
    }
}
