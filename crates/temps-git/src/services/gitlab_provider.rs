use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use super::git_provider::{
    Account, AccountKind, GitProviderError, GitProviderType, PageCursor, ProviderOptions,
    ProviderUser, Repository, RepositoryPage, RepositoryProvider,
};
use super::provider_http::ProviderHttp;

/// Header GitLab sets to the next page number, empty on the last page
const NEXT_PAGE_HEADER: &str = "X-Next-Page";

// Response structs for API calls

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitLabGroup {
    full_path: String,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitLabProject {
    name: String,
    path_with_namespace: String,
}

pub struct GitLabProvider {
    base_url: String,
    http: ProviderHttp,
    per_page: u32,
}

impl GitLabProvider {
    pub fn new(
        base_url: Option<String>,
        access_token: Option<String>,
        options: ProviderOptions,
    ) -> Result<Self, GitProviderError> {
        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| "https://gitlab.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            http: ProviderHttp::new(GitProviderType::GitLab, access_token, options.timeout)?,
            per_page: options.per_page,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }
}

fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(NEXT_PAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

#[async_trait]
impl RepositoryProvider for GitLabProvider {
    fn provider_type(&self) -> GitProviderType {
        GitProviderType::GitLab
    }

    fn has_access_token(&self) -> bool {
        self.http.has_access_token()
    }

    async fn user(&self) -> Result<ProviderUser, GitProviderError> {
        let response = self
            .http
            .get_json::<GitLabUser, _>(&self.api_url("/user"), &(), HeaderMap::new())
            .await?;

        let user = response.body;
        Ok(ProviderUser {
            login: user.username,
            name: user.name,
            avatar: user.avatar_url.unwrap_or_default(),
            id: None,
        })
    }

    async fn accounts(&self, user: &ProviderUser) -> Result<Vec<Account>, GitProviderError> {
        // Groups where the user is at least a developer
        let response = self
            .http
            .get_json::<Vec<GitLabGroup>, _>(
                &self.api_url("/groups"),
                &[("min_access_level", "30"), ("per_page", "100")],
                HeaderMap::new(),
            )
            .await?;

        let mut accounts = vec![user.to_account()];
        accounts.extend(response.body.into_iter().map(|group| {
            Account::new(
                &group.full_path,
                group.avatar_url.as_deref().unwrap_or_default(),
                AccountKind::Team,
            )
        }));
        Ok(accounts)
    }

    async fn repositories(
        &self,
        account: &Account,
        cursor: Option<PageCursor>,
    ) -> Result<RepositoryPage, GitProviderError> {
        let page = match cursor {
            None => 1,
            Some(PageCursor::GitLab { page }) => page,
            Some(_) => return Err(GitProviderError::CursorMismatch(GitProviderType::GitLab)),
        };

        let mut query = vec![
            ("simple", "true".to_string()),
            ("order_by", "last_activity_at".to_string()),
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        let url = match account.kind {
            AccountKind::User => {
                query.push(("membership", "true".to_string()));
                self.api_url("/projects")
            }
            AccountKind::Team | AccountKind::Org => {
                query.push(("include_subgroups", "true".to_string()));
                self.api_url(&format!(
                    "/groups/{}/projects",
                    urlencoding::encode(&account.login)
                ))
            }
        };

        let response = self
            .http
            .get_json::<Vec<GitLabProject>, _>(&url, &query, HeaderMap::new())
            .await?;

        let next = if response.body.is_empty() {
            None
        } else {
            next_page(&response.headers).map(|page| PageCursor::GitLab { page })
        };

        debug!(
            "GitLab {} page {}: {} projects",
            account.login,
            page,
            response.body.len()
        );

        Ok(RepositoryPage {
            repositories: response
                .body
                .into_iter()
                .map(|p| Repository::new(&p.name, &p.path_with_namespace))
                .collect(),
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_provider(server: &MockServer) -> GitLabProvider {
        GitLabProvider::new(
            Some(server.uri()),
            Some("glpat-test".to_string()),
            ProviderOptions {
                per_page: 2,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_user_and_groups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/user"))
            .and(header("Authorization", "Bearer glpat-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "username": "jdoe",
                "name": "Jane Doe",
                "avatar_url": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/groups"))
            .and(query_param("min_access_level", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"full_path": "platform/infra", "avatar_url": "https://gitlab.example.com/g.png"}
            ])))
            .mount(&server)
            .await;

        let provider = create_provider(&server);
        let user = provider.user().await.unwrap();
        let accounts = provider.accounts(&user).await.unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].login, "jdoe");
        assert_eq!(accounts[0].kind, AccountKind::User);
        assert_eq!(accounts[1].login, "platform/infra");
        assert_eq!(accounts[1].kind, AccountKind::Team);
        assert_eq!(provider.default_account(&user, &accounts), Some(0));
    }

    #[tokio::test]
    async fn test_next_page_header_drives_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .and(query_param("membership", "true"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(NEXT_PAGE_HEADER, "2")
                    .set_body_json(serde_json::json!([
                        {"name": "API", "path_with_namespace": "jdoe/api"},
                        {"name": "Web", "path_with_namespace": "jdoe/web"}
                    ])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(NEXT_PAGE_HEADER, "")
                    .set_body_json(serde_json::json!([
                        {"name": "Docs", "path_with_namespace": "jdoe/docs"}
                    ])),
            )
            .mount(&server)
            .await;

        let provider = create_provider(&server);
        let account = Account::new("jdoe", "", AccountKind::User);

        let first = provider.repositories(&account, None).await.unwrap();
        assert_eq!(first.repositories[0].full_identifier, "jdoe/api");
        assert_eq!(first.next, Some(PageCursor::GitLab { page: 2 }));

        let second = provider.repositories(&account, first.next).await.unwrap();
        assert_eq!(second.repositories.len(), 1);
        assert!(!second.has_next_page());
    }

    #[tokio::test]
    async fn test_missing_next_page_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/groups/platform%2Finfra/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Terraform", "path_with_namespace": "platform/infra/terraform"}
            ])))
            .mount(&server)
            .await;

        let provider = create_provider(&server);
        let account = Account::new("platform/infra", "", AccountKind::Team);

        let page = provider.repositories(&account, None).await.unwrap();
        assert_eq!(
            page.repositories[0].full_identifier,
            "platform/infra/terraform"
        );
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn test_empty_page_ignores_next_page_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(NEXT_PAGE_HEADER, "2")
                    .set_body_json(serde_json::json!([])),
            )
            .mount(&server)
            .await;

        let page = create_provider(&server)
            .repositories(&Account::new("jdoe", "", AccountKind::User), None)
            .await
            .unwrap();

        assert!(page.repositories.is_empty());
        assert!(!page.has_next_page());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "401 Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = create_provider(&server)
            .repositories(&Account::new("jdoe", "", AccountKind::User), None)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_next_page_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(next_page(&headers), None);

        headers.insert(NEXT_PAGE_HEADER, "3".parse().unwrap());
        assert_eq!(next_page(&headers), Some(3));

        headers.insert(NEXT_PAGE_HEADER, " ".parse().unwrap());
        assert_eq!(next_page(&headers), None);
    }
}
