use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use temps_config::ConsoleConfig;
use temps_core::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitProviderError {
    /// The provider rejected the access token (HTTP 401), or there is none
    #[error("Unauthorized: {0} requires a new login")]
    Unauthorized(GitProviderType),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Account cannot be listed: {0}")]
    InvalidAccount(String),

    #[error("Cursor belongs to {0}")]
    CursorMismatch(GitProviderType),
}

impl GitProviderError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GitProviderError::Unauthorized(_))
    }
}

impl From<GitProviderError> for ServiceError {
    fn from(err: GitProviderError) -> Self {
        match err {
            GitProviderError::Unauthorized(provider) => ServiceError::Unauthorized {
                provider: provider.to_string(),
            },
            other => ServiceError::ExternalService {
                service: "git".to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProviderType {
    GitHub,
    GitLab,
    Bitbucket,
}

impl GitProviderType {
    /// Key under which the provider's access token is stored
    pub fn token_key(&self) -> &'static str {
        match self {
            GitProviderType::GitHub => "github",
            GitProviderType::GitLab => "gitlab",
            GitProviderType::Bitbucket => "bitbucket",
        }
    }
}

impl std::fmt::Display for GitProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitProviderType::GitHub => write!(f, "github"),
            GitProviderType::GitLab => write!(f, "gitlab"),
            GitProviderType::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl TryFrom<&str> for GitProviderType {
    type Error = GitProviderError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "github" => Ok(GitProviderType::GitHub),
            "gitlab" => Ok(GitProviderType::GitLab),
            "bitbucket" => Ok(GitProviderType::Bitbucket),
            _ => Err(GitProviderError::InvalidConfiguration(format!(
                "Unknown provider type: {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    User,
    Team,
    Org,
}

/// A user, team or organization whose repositories can be listed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
    pub avatar: String,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    /// GitHub App installation granting access to this account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<String>,
    pub selected: bool,
}

impl Account {
    pub fn new(login: &str, avatar: &str, kind: AccountKind) -> Self {
        Self {
            login: login.to_string(),
            avatar: avatar.to_string(),
            kind,
            installation_id: None,
            selected: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub login: String,
    pub name: Option<String>,
    pub avatar: String,
    /// Stable provider id, such as the Bitbucket account UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ProviderUser {
    pub fn to_account(&self) -> Account {
        Account::new(&self.login, &self.avatar, AccountKind::User)
    }

    /// Whether `login` names this user, by login or display name
    pub fn matches(&self, login: &str) -> bool {
        self.login.eq_ignore_ascii_case(login)
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(login))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    /// `owner/repo` on GitHub and Bitbucket, `namespace/path` on GitLab
    pub full_identifier: String,
}

impl Repository {
    pub fn new(name: &str, full_identifier: &str) -> Self {
        Self {
            name: name.to_string(),
            full_identifier: full_identifier.to_string(),
        }
    }
}

/// Continuation marker for a repository listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum PageCursor {
    /// Next page number and how many repositories earlier pages returned
    GitHub { page: u32, fetched: u64 },
    GitLab { page: u32 },
    /// Query parameters of the `next` link
    Bitbucket { params: Vec<(String, String)> },
}

impl PageCursor {
    pub fn provider(&self) -> GitProviderType {
        match self {
            PageCursor::GitHub { .. } => GitProviderType::GitHub,
            PageCursor::GitLab { .. } => GitProviderType::GitLab,
            PageCursor::Bitbucket { .. } => GitProviderType::Bitbucket,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    pub repositories: Vec<Repository>,
    pub next: Option<PageCursor>,
}

impl RepositoryPage {
    pub fn has_next_page(&self) -> bool {
        self.next.is_some()
    }
}

/// Trait that all repository providers implement
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    fn provider_type(&self) -> GitProviderType;

    /// Whether a stored access token exists. Without one no request is made.
    fn has_access_token(&self) -> bool;

    /// Get the authenticated user
    async fn user(&self) -> Result<ProviderUser, GitProviderError>;

    /// Accounts whose repositories the user can list, in provider order
    async fn accounts(&self, user: &ProviderUser) -> Result<Vec<Account>, GitProviderError>;

    /// Fetch one page of repositories for `account`, starting at `cursor`
    /// or at the first page
    async fn repositories(
        &self,
        account: &Account,
        cursor: Option<PageCursor>,
    ) -> Result<RepositoryPage, GitProviderError>;

    /// Index of the account to select first
    fn default_account(&self, user: &ProviderUser, accounts: &[Account]) -> Option<usize> {
        if accounts.is_empty() {
            return None;
        }
        Some(
            accounts
                .iter()
                .position(|a| a.login.eq_ignore_ascii_case(&user.login))
                .unwrap_or(0),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderOptions {
    pub per_page: u32,
    pub timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            per_page: 30,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ConsoleConfig> for ProviderOptions {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            per_page: config.per_page,
            timeout: config.request_timeout(),
        }
    }
}

/// Factory for creating provider instances
pub struct GitProviderFactory;

impl GitProviderFactory {
    pub fn create_provider(
        provider_type: GitProviderType,
        config: &ConsoleConfig,
        access_token: Option<String>,
    ) -> Result<Arc<dyn RepositoryProvider>, GitProviderError> {
        let options = ProviderOptions::from(config);
        match provider_type {
            GitProviderType::GitHub => {
                use crate::services::github_provider::GitHubProvider;
                Ok(Arc::new(GitHubProvider::new(
                    Some(config.github_api_url.clone()),
                    access_token,
                    options,
                )?))
            }
            GitProviderType::GitLab => {
                use crate::services::gitlab_provider::GitLabProvider;
                Ok(Arc::new(GitLabProvider::new(
                    Some(config.gitlab_url.clone()),
                    access_token,
                    options,
                )?))
            }
            GitProviderType::Bitbucket => {
                use crate::services::bitbucket_provider::BitbucketProvider;
                Ok(Arc::new(BitbucketProvider::new(
                    Some(config.bitbucket_api_url.clone()),
                    access_token,
                    options,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(
            GitProviderType::try_from("GitHub").unwrap(),
            GitProviderType::GitHub
        );
        assert_eq!(
            GitProviderType::try_from("bitbucket").unwrap(),
            GitProviderType::Bitbucket
        );
        assert!(GitProviderType::try_from("gitea").is_err());
        assert_eq!(GitProviderType::GitLab.token_key(), "gitlab");
    }

    #[test]
    fn test_user_matches_login_or_name() {
        let user = ProviderUser {
            login: "octocat".to_string(),
            name: Some("The Octocat".to_string()),
            avatar: String::new(),
            id: None,
        };
        assert!(user.matches("OctoCat"));
        assert!(user.matches("the octocat"));
        assert!(!user.matches("hubot"));
    }

    #[test]
    fn test_unauthorized_maps_to_login_request() {
        let err: ServiceError = GitProviderError::Unauthorized(GitProviderType::GitLab).into();
        assert!(err.requires_login());

        let err: ServiceError = GitProviderError::RateLimitExceeded.into();
        assert!(!err.requires_login());
    }

    #[test]
    fn test_account_serializes_type_field() {
        let account = Account::new("acme", "https://example.com/a.png", AccountKind::Org);
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["type"], "org");
        assert!(json.get("installation_id").is_none());
    }
}
