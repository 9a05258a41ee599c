use async_trait::async_trait;
use http::StatusCode;
use url::Url;

use crate::config::{SessionConfig, http_client};
use crate::session::errors::{SessionError, ValidationErrors};
use crate::session::types::{RegistrationRequest, TokenResponse, UserProfile};
use crate::storage::Credential;
use crate::utils::{detail_from_body, endpoint, parse_base_url};

/// Identity endpoints the session manager talks to.
#[async_trait]
pub trait IdentityBackend: Send + Sync + 'static {
    /// `POST /auth/token` with the password grant.
    async fn exchange_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, SessionError>;

    /// `GET /auth/me` with the credential as bearer.
    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile, SessionError>;

    /// `POST /auth/refresh` with the current credential as bearer.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, SessionError>;

    /// `POST /auth/register`.
    async fn register(&self, request: &RegistrationRequest) -> Result<UserProfile, SessionError>;
}

/// [`IdentityBackend`] over HTTP.
pub struct HttpIdentityBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpIdentityBackend {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let base_url = parse_base_url(&config.api_url)
            .map_err(|e| SessionError::Config(format!("Invalid API URL: {e}")))?;
        Ok(Self {
            client: http_client(config.http_timeout),
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> SessionError {
    tracing::warn!("Identity backend unreachable: {}", e);
    SessionError::NetworkUnreachable(e.to_string())
}

async fn backend_error(response: reqwest::Response) -> SessionError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SessionError::Backend {
        status: status.as_u16(),
        detail: detail_from_body(status, &body),
    }
}

async fn read_token(
    response: reqwest::Response,
    previous_refresh: Option<&str>,
) -> Result<Credential, SessionError> {
    let status = response.status();
    let token: TokenResponse = response.json().await.map_err(|e| SessionError::Backend {
        status: status.as_u16(),
        detail: format!("Invalid token response: {e}"),
    })?;

    let access_token = token.access_token.ok_or_else(|| SessionError::Backend {
        status: status.as_u16(),
        detail: "No access token received".to_string(),
    })?;

    let refresh_token = token
        .refresh_token
        .or_else(|| previous_refresh.map(str::to_string));

    Ok(Credential::new(access_token, refresh_token))
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn exchange_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, SessionError> {
        let response = self
            .client
            .post(self.url("/auth/token"))
            .header(http::header::ACCEPT, "application/json")
            .form(&[
                ("username", username),
                ("password", password),
                ("grant_type", "password"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        tracing::debug!("POST /auth/token -> {}", response.status());

        match response.status() {
            s if s.is_success() => read_token(response, None).await,
            StatusCode::UNAUTHORIZED => Err(SessionError::InvalidCredentials),
            _ => Err(backend_error(response).await),
        }
    }

    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile, SessionError> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .header(http::header::ACCEPT, "application/json")
            .bearer_auth(credential.access_token())
            .send()
            .await
            .map_err(transport_error)?;

        tracing::debug!("GET /auth/me -> {}", response.status());

        match response.status() {
            s if s.is_success() => {
                let status = s.as_u16();
                response.json().await.map_err(|e| SessionError::Backend {
                    status,
                    detail: format!("Invalid profile response: {e}"),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SessionError::NotAuthenticated),
            _ => Err(backend_error(response).await),
        }
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, SessionError> {
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .header(http::header::ACCEPT, "application/json")
            .bearer_auth(credential.access_token())
            .send()
            .await
            .map_err(transport_error)?;

        tracing::debug!("POST /auth/refresh -> {}", response.status());

        match response.status() {
            s if s.is_success() => read_token(response, credential.refresh_token()).await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SessionError::NotAuthenticated),
            _ => Err(backend_error(response).await),
        }
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<UserProfile, SessionError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .header(http::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        tracing::debug!("POST /auth/register -> {}", status);

        if status.is_success() {
            return response.json().await.map_err(|e| SessionError::Backend {
                status: status.as_u16(),
                detail: format!("Invalid registration response: {e}"),
            });
        }

        let body = response.text().await.unwrap_or_default();
        if matches!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST
        ) {
            let parsed = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|json| ValidationErrors::from_body(&json));
            if let Some(errors) = parsed {
                return Err(SessionError::Validation(errors));
            }
        }

        Err(SessionError::Backend {
            status: status.as_u16(),
            detail: detail_from_body(status, &body),
        })
    }
}
