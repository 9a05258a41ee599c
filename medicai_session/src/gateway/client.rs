use http::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use super::errors::GatewayError;
use super::request::ApiRequest;
use crate::config::{SessionConfig, http_client};
use crate::session::{SessionError, SessionManager};
use crate::storage::Credential;
use crate::utils::{detail_from_body, endpoint, parse_base_url};

/// Single chokepoint for authenticated API calls.
///
/// Attaches the current bearer token and, on a 401, performs at most one
/// coordinated refresh-and-retry through the [`SessionManager`].
#[derive(Clone)]
pub struct RequestGateway {
    client: reqwest::Client,
    base_url: Url,
    session: SessionManager,
}

impl RequestGateway {
    pub fn new(config: &SessionConfig, session: SessionManager) -> Result<Self, GatewayError> {
        let base_url = parse_base_url(&config.api_url)
            .map_err(|e| GatewayError::Config(format!("Invalid API URL: {e}")))?;
        Ok(Self {
            client: http_client(config.http_timeout),
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Send `request` and return the raw response.
    ///
    /// Non-success statuses are returned as responses, not errors. A 401 that
    /// survives the retry (or whose refresh failed) is the response the caller sees.
    pub async fn send(&self, mut request: ApiRequest) -> Result<reqwest::Response, GatewayError> {
        let request_id = Uuid::new_v4();
        let attached = self.session.credential().await?;

        let response = self
            .dispatch(&request, attached.as_ref(), request_id)
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.retried {
            return Ok(response);
        }

        // Nothing was attached, so there is nothing to refresh
        let Some(sent) = attached else {
            return Ok(response);
        };

        request.retried = true;

        let retry_with = match self.session.refresh_if_current(&sent).await {
            Ok(fresh) => fresh,
            Err(SessionError::NotAuthenticated) => {
                tracing::debug!(%request_id, "Session ended while request was in flight");
                return Ok(response);
            }
            Err(e) => {
                tracing::warn!(%request_id, "Refresh after 401 failed: {}", e.kind());
                return Ok(response);
            }
        };

        tracing::debug!(%request_id, "Retrying {} {} once", request.method, request.path);
        self.dispatch(&request, Some(&retry_with), request_id).await
    }

    /// Send `request` and decode a JSON success body.
    ///
    /// An empty body decodes as JSON `null`, so `()` works for 204 responses.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                detail: detail_from_body(status, &body),
            });
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
        request_id: Uuid,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut builder = self
            .client
            .request(request.method.clone(), endpoint(&self.base_url, &request.path))
            .header(http::header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.access_token());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%request_id, "{} {} failed: {}", request.method, request.path, e);
            GatewayError::from(e)
        })?;

        tracing::debug!(
            %request_id,
            "{} {} -> {}",
            request.method,
            request.path,
            response.status()
        );
        Ok(response)
    }
}
