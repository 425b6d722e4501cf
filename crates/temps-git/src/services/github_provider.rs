use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use tracing::{debug, info};

use super::git_provider::{
    Account, AccountKind, GitProviderError, GitProviderType, PageCursor, ProviderOptions,
    ProviderUser, Repository, RepositoryPage, RepositoryProvider,
};
use super::provider_http::ProviderHttp;

// Response structs for API calls

#[derive(Deserialize)]
struct GitHubUser {
    login: String,
    name: Option<String>,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Deserialize)]
struct InstallationsResponse {
    installations: Vec<GitHubInstallation>,
}

#[derive(Deserialize)]
struct GitHubInstallation {
    id: i64,
    account: GitHubInstallationAccount,
}

#[derive(Deserialize)]
struct GitHubInstallationAccount {
    login: String,
    #[serde(default)]
    avatar_url: String,
    #[serde(rename = "type")]
    account_type: String,
}

#[derive(Deserialize)]
struct InstallationRepositoriesResponse {
    total_count: u64,
    repositories: Vec<GitHubRepo>,
}

#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    full_name: String,
}

/// GitHub client that lists repositories through the hosting app's
/// installations
pub struct GitHubProvider {
    api_url: String,
    http: ProviderHttp,
    per_page: u32,
}

impl GitHubProvider {
    pub fn new(
        api_url: Option<String>,
        access_token: Option<String>,
        options: ProviderOptions,
    ) -> Result<Self, GitProviderError> {
        Ok(Self {
            api_url: api_url
                .unwrap_or_else(|| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            http: ProviderHttp::new(GitProviderType::GitHub, access_token, options.timeout)?,
            per_page: options.per_page,
        })
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }
}

#[async_trait]
impl RepositoryProvider for GitHubProvider {
    fn provider_type(&self) -> GitProviderType {
        GitProviderType::GitHub
    }

    fn has_access_token(&self) -> bool {
        self.http.has_access_token()
    }

    async fn user(&self) -> Result<ProviderUser, GitProviderError> {
        let response = self
            .http
            .get_json::<GitHubUser, _>(&format!("{}/user", self.api_url), &(), self.get_headers())
            .await?;

        let user = response.body;
        Ok(ProviderUser {
            login: user.login,
            name: user.name,
            avatar: user.avatar_url,
            id: None,
        })
    }

    async fn accounts(&self, _user: &ProviderUser) -> Result<Vec<Account>, GitProviderError> {
        let response = self
            .http
            .get_json::<InstallationsResponse, _>(
                &format!("{}/user/installations", self.api_url),
                &[("per_page", "100")],
                self.get_headers(),
            )
            .await?;

        let accounts: Vec<Account> = response
            .body
            .installations
            .into_iter()
            .map(|installation| {
                let kind = match installation.account.account_type.as_str() {
                    "Organization" => AccountKind::Org,
                    _ => AccountKind::User,
                };
                Account {
                    installation_id: Some(installation.id.to_string()),
                    ..Account::new(
                        &installation.account.login,
                        &installation.account.avatar_url,
                        kind,
                    )
                }
            })
            .collect();

        info!("Found {} GitHub App installations", accounts.len());
        Ok(accounts)
    }

    async fn repositories(
        &self,
        account: &Account,
        cursor: Option<PageCursor>,
    ) -> Result<RepositoryPage, GitProviderError> {
        let installation_id = account.installation_id.as_deref().ok_or_else(|| {
            GitProviderError::InvalidAccount(format!(
                "{} has no GitHub App installation",
                account.login
            ))
        })?;

        let (page, fetched) = match cursor {
            None => (1, 0),
            Some(PageCursor::GitHub { page, fetched }) => (page, fetched),
            Some(_) => return Err(GitProviderError::CursorMismatch(GitProviderType::GitHub)),
        };

        let response = self
            .http
            .get_json::<InstallationRepositoriesResponse, _>(
                &format!(
                    "{}/user/installations/{}/repositories",
                    self.api_url, installation_id
                ),
                &[
                    ("page", page.to_string()),
                    ("per_page", self.per_page.to_string()),
                ],
                self.get_headers(),
            )
            .await?;

        let body = response.body;
        let fetched = fetched + body.repositories.len() as u64;
        let next = if !body.repositories.is_empty() && fetched < body.total_count {
            Some(PageCursor::GitHub {
                page: page + 1,
                fetched,
            })
        } else {
            None
        };

        debug!(
            "GitHub installation {} page {}: {}/{} repositories",
            installation_id, page, fetched, body.total_count
        );

        Ok(RepositoryPage {
            repositories: body
                .repositories
                .into_iter()
                .map(|r| Repository::new(&r.name, &r.full_name))
                .collect(),
            next,
        })
    }

    /// Installations shared by collaborators can come back before the user's
    /// own, so prefer the one named after the user
    fn default_account(&self, user: &ProviderUser, accounts: &[Account]) -> Option<usize> {
        if accounts.is_empty() {
            return None;
        }
        Some(
            accounts
                .iter()
                .position(|a| user.matches(&a.login))
                .unwrap_or(0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_provider(server: &MockServer, per_page: u32) -> GitHubProvider {
        GitHubProvider::new(
            Some(server.uri()),
            Some("gho_test".to_string()),
            ProviderOptions {
                per_page,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn installation_account(id: &str) -> Account {
        Account {
            installation_id: Some(id.to_string()),
            ..Account::new("octocat", "", AccountKind::User)
        }
    }

    #[tokio::test]
    async fn test_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "Bearer gho_test"))
            .and(header("X-GitHub-Api-Version", "2022-11-28"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "octocat",
                "name": "The Octocat",
                "avatar_url": "https://avatars.example.com/u/1"
            })))
            .mount(&server)
            .await;

        let user = create_provider(&server, 30).user().await.unwrap();
        assert_eq!(user.login, "octocat");
        assert_eq!(user.name.as_deref(), Some("The Octocat"));
    }

    #[tokio::test]
    async fn test_installations_become_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/installations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 2,
                "installations": [
                    {"id": 11, "account": {"login": "acme", "avatar_url": "a", "type": "Organization"}},
                    {"id": 22, "account": {"login": "octocat", "avatar_url": "b", "type": "User"}}
                ]
            })))
            .mount(&server)
            .await;

        let provider = create_provider(&server, 30);
        let user = ProviderUser {
            login: "octocat".to_string(),
            name: None,
            avatar: String::new(),
            id: None,
        };
        let accounts = provider.accounts(&user).await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].kind, AccountKind::Org);
        assert_eq!(accounts[1].installation_id.as_deref(), Some("22"));
        assert_eq!(provider.default_account(&user, &accounts), Some(1));
    }

    #[tokio::test]
    async fn test_pagination_uses_total_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/installations/22/repositories"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 3,
                "repositories": [
                    {"name": "api", "full_name": "octocat/api"},
                    {"name": "web", "full_name": "octocat/web"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/installations/22/repositories"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 3,
                "repositories": [{"name": "docs", "full_name": "octocat/docs"}]
            })))
            .mount(&server)
            .await;

        let provider = create_provider(&server, 2);
        let account = installation_account("22");

        let first = provider.repositories(&account, None).await.unwrap();
        assert_eq!(first.repositories.len(), 2);
        assert_eq!(
            first.next,
            Some(PageCursor::GitHub {
                page: 2,
                fetched: 2
            })
        );

        let second = provider.repositories(&account, first.next).await.unwrap();
        assert_eq!(second.repositories[0].full_identifier, "octocat/docs");
        assert!(!second.has_next_page());
    }

    #[tokio::test]
    async fn test_empty_page_stops_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/installations/22/repositories"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 10,
                "repositories": []
            })))
            .mount(&server)
            .await;

        let provider = create_provider(&server, 2);
        let page = provider
            .repositories(
                &installation_account("22"),
                Some(PageCursor::GitHub {
                    page: 3,
                    fetched: 4,
                }),
            )
            .await
            .unwrap();

        assert!(page.repositories.is_empty());
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = create_provider(&server, 30).user().await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_rate_limited_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(403).insert_header("X-RateLimit-Remaining", "0"))
            .mount(&server)
            .await;

        let err = create_provider(&server, 30).user().await.unwrap_err();
        assert!(matches!(err, GitProviderError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_foreign_cursor_is_rejected() {
        let server = MockServer::start().await;
        let provider = create_provider(&server, 30);

        let err = provider
            .repositories(
                &installation_account("22"),
                Some(PageCursor::GitLab { page: 2 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GitProviderError::CursorMismatch(GitProviderType::GitHub)
        ));
    }

    #[tokio::test]
    async fn test_account_without_installation() {
        let server = MockServer::start().await;
        let provider = create_provider(&server, 30);

        let err = provider
            .repositories(&Account::new("octocat", "", AccountKind::User), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GitProviderError::InvalidAccount(_)));
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider =
            GitHubProvider::new(Some(server.uri()), None, ProviderOptions::default()).unwrap();
        assert!(!provider.has_access_token());
        assert!(provider.user().await.unwrap_err().is_unauthorized());
    }
}
