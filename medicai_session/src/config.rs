//! Central configuration for the medicai_session crate

use std::env;
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Base URL of the identity/API backend.
///
/// Default: "http://localhost:8000"
pub static MEDICAI_API_URL: LazyLock<String> = LazyLock::new(resolve_api_url);

/// Seconds before token expiry at which renewal is attempted.
pub(crate) static SESSION_RENEWAL_LEAD_SECS: LazyLock<u64> =
    LazyLock::new(|| resolve_secs("SESSION_RENEWAL_LEAD_SECS", 300)); // 5 minutes

pub(crate) static HTTP_TIMEOUT_SECS: LazyLock<u64> =
    LazyLock::new(|| resolve_secs("HTTP_TIMEOUT_SECS", 30));

fn resolve_api_url() -> String {
    env::var("MEDICAI_API_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

fn resolve_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Settings a [`crate::SessionManager`] and [`crate::RequestGateway`] are built from.
///
/// `from_env()` snapshots the process-wide statics; tests construct it directly.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_url: String,
    pub renewal_lead: Duration,
    pub http_timeout: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: MEDICAI_API_URL.clone(),
            renewal_lead: Duration::from_secs(*SESSION_RENEWAL_LEAD_SECS),
            http_timeout: Duration::from_secs(*HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            renewal_lead: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(32)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
