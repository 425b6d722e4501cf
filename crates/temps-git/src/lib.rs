//! Git provider integrations and repository browsing
//!
//! Each hosting provider implements [`RepositoryProvider`]. A
//! [`RepositoryBrowser`] drives one provider through login, account
//! selection and paginated repository listing.

pub mod services;

// Re-export commonly used types for external crates
pub use services::bitbucket_provider::BitbucketProvider;
pub use services::git_provider::{
    Account, AccountKind, GitProviderError, GitProviderFactory, GitProviderType, PageCursor,
    ProviderOptions, ProviderUser, Repository, RepositoryPage, RepositoryProvider,
};
pub use services::github_provider::GitHubProvider;
pub use services::gitlab_provider::GitLabProvider;
pub use services::repository_browser::{
    BrowserAction, BrowserState, BrowserStatus, BrowserView, Listing, RepositoryBrowser,
};
