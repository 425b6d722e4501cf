use std::sync::Arc;

use temps_core::GENERIC_ERROR_MESSAGE;
use temps_git::{
    BrowserStatus, GitHubProvider, GitLabProvider, ProviderOptions, RepositoryBrowser,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(per_page: u32) -> ProviderOptions {
    ProviderOptions {
        per_page,
        ..Default::default()
    }
}

async fn mount_github_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "login": "octocat",
            "name": "The Octocat",
            "avatar_url": "https://avatars.example.com/u/1"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/installations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 2,
            "installations": [
                {"id": 11, "account": {"login": "acme", "avatar_url": "a", "type": "Organization"}},
                {"id": 22, "account": {"login": "octocat", "avatar_url": "b", "type": "User"}}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_github_session_pages_through_user_installation() {
    let server = MockServer::start().await;
    mount_github_session(&server).await;
    Mock::given(method("GET"))
        .and(path("/user/installations/22/repositories"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 3,
            "repositories": [
                {"name": "api", "full_name": "octocat/api"},
                {"name": "web", "full_name": "octocat/web"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/installations/22/repositories"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 3,
            "repositories": [{"name": "docs", "full_name": "octocat/docs"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GitHubProvider::new(Some(server.uri()), Some("gho_test".to_string()), options(2))
        .unwrap();
    let browser = RepositoryBrowser::new(Arc::new(provider));

    let view = browser.init().await;
    assert_eq!(view.status, BrowserStatus::Loaded);
    assert_eq!(
        view.selected_account.as_ref().map(|a| a.login.as_str()),
        Some("octocat")
    );
    assert_eq!(view.repositories.len(), 2);
    assert!(view.has_next_page);

    let view = browser.load_all().await;
    let identifiers: Vec<&str> = view
        .repositories
        .iter()
        .map(|r| r.full_identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["octocat/api", "octocat/web", "octocat/docs"]);
    assert!(!view.has_next_page);
}

#[tokio::test]
async fn test_github_server_error_is_generic() {
    let server = MockServer::start().await;
    mount_github_session(&server).await;
    Mock::given(method("GET"))
        .and(path("/user/installations/22/repositories"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GitHubProvider::new(Some(server.uri()), Some("gho_test".to_string()), options(30))
        .unwrap();
    let browser = RepositoryBrowser::new(Arc::new(provider));

    let view = browser.init().await;
    assert_eq!(view.status, BrowserStatus::Errored);
    assert_eq!(view.error.as_deref(), Some(GENERIC_ERROR_MESSAGE));
    assert!(!view.loading);
    assert!(!view.requires_login);
}

#[tokio::test]
async fn test_expired_gitlab_token_requires_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider =
        GitLabProvider::new(Some(server.uri()), Some("glpat-old".to_string()), options(30))
            .unwrap();
    let browser = RepositoryBrowser::new(Arc::new(provider));

    let view = browser.init().await;
    assert!(view.requires_login);
    assert!(view.repositories.is_empty());
}

#[tokio::test]
async fn test_missing_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = GitLabProvider::new(Some(server.uri()), None, options(30)).unwrap();
    let browser = RepositoryBrowser::new(Arc::new(provider));

    let view = browser.init().await;
    assert_eq!(view.status, BrowserStatus::RequiresLogin);
}
