//! REST client for the Temps platform API
//!
//! Thin JSON wrapper over `reqwest`: attaches the stored bearer token,
//! persists a refreshed token when the server hands one back, and turns
//! non-2xx responses into [`ApiError`].
//!
//! Nothing in the `temps-console` binary calls the platform API yet; the
//! client is exercised by its own tests only.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::token_store::{TokenStore, API_TOKEN_KEY};

/// Response header carrying a rotated access token
pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";

/// Where the console sends users whose account no longer exists
pub const AUTH_REDIRECT: &str = "/auth";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session user no longer exists, redirect to {redirect}")]
    SessionExpired { redirect: String },

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::SessionExpired { .. } => Some(403),
            _ => None,
        }
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::SessionExpired { .. } | ApiError::Status { status: 401, .. } => {
                ServiceError::Unauthorized {
                    provider: "temps".to_string(),
                }
            }
            other => ServiceError::ExternalService {
                service: "temps".to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        url::Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent("Temps-Console/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<(), T>(Method::DELETE, path, None).await
    }

    async fn request<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("Temps API request: {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(token) = self.store.get(API_TOKEN_KEY) {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if let Some(refreshed) = response
            .headers()
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            debug!("Persisting refreshed API token");
            if let Err(e) = self.store.set(API_TOKEN_KEY, refreshed) {
                warn!("Failed to persist refreshed API token: {}", e);
            }
        }

        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 403 && is_user_deleted(&text) {
                warn!("Session user is gone, redirecting to {}", AUTH_REDIRECT);
                return Err(ApiError::SessionExpired {
                    redirect: AUTH_REDIRECT.to_string(),
                });
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text)
            .map_err(|e| ApiError::Decode(format!("{} - Body: {}", e, text)))
    }
}

fn is_user_deleted(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("user_deleted").and_then(|f| f.as_bool()))
        .unwrap_or(false)
}
