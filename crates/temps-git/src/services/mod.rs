pub mod bitbucket_provider;
pub mod git_provider;
pub mod github_provider;
pub mod gitlab_provider;
mod provider_http;
pub mod repository_browser;
