//! HTTP plumbing shared by the provider clients

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::git_provider::{GitProviderError, GitProviderType};

pub(crate) struct ProviderHttp {
    client: Client,
    provider: GitProviderType,
    access_token: Option<String>,
}

/// A decoded JSON body together with the response headers
pub(crate) struct JsonResponse<T> {
    pub headers: HeaderMap,
    pub body: T,
}

impl ProviderHttp {
    pub fn new(
        provider: GitProviderType,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GitProviderError> {
        let client = Client::builder()
            .user_agent("Temps-Console/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            provider,
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// GET `url` and decode the JSON body. A missing token fails with
    /// `Unauthorized` before anything is sent.
    pub async fn get_json<T, Q>(
        &self,
        url: &str,
        query: &Q,
        extra_headers: HeaderMap,
    ) -> Result<JsonResponse<T>, GitProviderError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let token = self
            .access_token
            .as_deref()
            .ok_or(GitProviderError::Unauthorized(self.provider))?;

        let mut headers = extra_headers;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            GitProviderError::InvalidConfiguration("Access token is not a valid header".to_string())
        })?;
        headers.insert(AUTHORIZATION, bearer);

        debug!("{} API request: GET {}", self.provider, url);

        let response = self
            .client
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            return Err(self.status_error(status.as_u16(), &headers, response.text().await.ok()));
        }

        let text = response.text().await?;
        let body = serde_json::from_str(&text).map_err(|e| {
            GitProviderError::Decode(format!("{} response: {} - Body: {}", self.provider, e, text))
        })?;

        Ok(JsonResponse { headers, body })
    }

    fn status_error(&self, status: u16, headers: &HeaderMap, body: Option<String>) -> GitProviderError {
        let rate_limited = headers
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            == Some(0);

        match status {
            401 => GitProviderError::Unauthorized(self.provider),
            429 => GitProviderError::RateLimitExceeded,
            403 if rate_limited => GitProviderError::RateLimitExceeded,
            _ => {
                let message = body.unwrap_or_else(|| "Unknown error".to_string());
                warn!("{} API returned {}: {}", self.provider, status, message);
                GitProviderError::ApiError { status, message }
            }
        }
    }
}
