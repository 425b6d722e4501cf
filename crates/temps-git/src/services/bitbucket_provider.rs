use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use super::git_provider::{
    Account, AccountKind, GitProviderError, GitProviderType, PageCursor, ProviderOptions,
    ProviderUser, Repository, RepositoryPage, RepositoryProvider,
};
use super::provider_http::ProviderHttp;

// Response structs for API calls

#[derive(Deserialize)]
struct BitbucketUser {
    username: Option<String>,
    nickname: Option<String>,
    display_name: Option<String>,
    uuid: Option<String>,
    #[serde(default)]
    links: BitbucketLinks,
}

#[derive(Deserialize, Default)]
struct BitbucketLinks {
    avatar: Option<BitbucketLink>,
}

#[derive(Deserialize)]
struct BitbucketLink {
    href: String,
}

impl BitbucketLinks {
    fn avatar(&self) -> &str {
        self.avatar.as_ref().map(|l| l.href.as_str()).unwrap_or_default()
    }
}

/// Paginated list envelope used by every Bitbucket listing endpoint
#[derive(Deserialize)]
struct Paginated<T> {
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct BitbucketWorkspace {
    slug: String,
    uuid: Option<String>,
    #[serde(default)]
    links: BitbucketLinks,
}

#[derive(Deserialize)]
struct BitbucketRepo {
    name: String,
    full_name: String,
}

pub struct BitbucketProvider {
    api_url: String,
    http: ProviderHttp,
    per_page: u32,
}

impl BitbucketProvider {
    pub fn new(
        api_url: Option<String>,
        access_token: Option<String>,
        options: ProviderOptions,
    ) -> Result<Self, GitProviderError> {
        Ok(Self {
            api_url: api_url
                .unwrap_or_else(|| "https://api.bitbucket.org/2.0".to_string())
                .trim_end_matches('/')
                .to_string(),
            http: ProviderHttp::new(GitProviderType::Bitbucket, access_token, options.timeout)?,
            per_page: options.per_page,
        })
    }
}

/// A workspace belongs to the user when it shares the account UUID or is
/// named after the user
fn is_personal_workspace(workspace: &BitbucketWorkspace, user: &ProviderUser) -> bool {
    let same_uuid = match (&workspace.uuid, &user.id) {
        (Some(workspace_id), Some(user_id)) => workspace_id.eq_ignore_ascii_case(user_id),
        _ => false,
    };
    same_uuid || workspace.slug.eq_ignore_ascii_case(&user.login)
}

/// Turn a `next` link into the parameter bag for the following request
fn next_cursor(next: Option<&str>) -> Result<Option<PageCursor>, GitProviderError> {
    let Some(next) = next.filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    let url = url::Url::parse(next)
        .map_err(|e| GitProviderError::Decode(format!("Invalid next link '{}': {}", next, e)))?;
    let params = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    Ok(Some(PageCursor::Bitbucket { params }))
}

#[async_trait]
impl RepositoryProvider for BitbucketProvider {
    fn provider_type(&self) -> GitProviderType {
        GitProviderType::Bitbucket
    }

    fn has_access_token(&self) -> bool {
        self.http.has_access_token()
    }

    async fn user(&self) -> Result<ProviderUser, GitProviderError> {
        let response = self
            .http
            .get_json::<BitbucketUser, _>(&format!("{}/user", self.api_url), &(), HeaderMap::new())
            .await?;

        let user = response.body;
        let login = user
            .username
            .or(user.nickname)
            .or_else(|| user.uuid.clone())
            .ok_or_else(|| GitProviderError::Decode("Bitbucket user has no username".to_string()))?;

        Ok(ProviderUser {
            avatar: user.links.avatar().to_string(),
            login,
            name: user.display_name,
            id: user.uuid,
        })
    }

    /// The user's personal workspace comes first as the `user` account,
    /// every other workspace follows as a `team`
    async fn accounts(&self, user: &ProviderUser) -> Result<Vec<Account>, GitProviderError> {
        let response = self
            .http
            .get_json::<Paginated<BitbucketWorkspace>, _>(
                &format!("{}/workspaces", self.api_url),
                &[("role", "member"), ("pagelen", "100")],
                HeaderMap::new(),
            )
            .await?;

        let (personal, shared): (Vec<_>, Vec<_>) = response
            .body
            .values
            .into_iter()
            .partition(|w| is_personal_workspace(w, user));

        // Without a personal workspace the account UUID still addresses
        // the user's repositories
        let user_login = match personal.first() {
            Some(workspace) => workspace.slug.clone(),
            None => user.id.clone().unwrap_or_else(|| user.login.clone()),
        };

        let mut accounts = vec![Account::new(&user_login, &user.avatar, AccountKind::User)];
        accounts.extend(
            shared
                .into_iter()
                .map(|w| Account::new(&w.slug, w.links.avatar(), AccountKind::Team)),
        );
        Ok(accounts)
    }

    fn default_account(&self, _user: &ProviderUser, accounts: &[Account]) -> Option<usize> {
        accounts.iter().position(|a| a.kind == AccountKind::User)
    }

    async fn repositories(
        &self,
        account: &Account,
        cursor: Option<PageCursor>,
    ) -> Result<RepositoryPage, GitProviderError> {
        let params = match cursor {
            None => vec![("pagelen".to_string(), self.per_page.to_string())],
            Some(PageCursor::Bitbucket { params }) => params,
            Some(_) => {
                return Err(GitProviderError::CursorMismatch(
                    GitProviderType::Bitbucket,
                ))
            }
        };

        let url = format!(
            "{}/repositories/{}",
            self.api_url,
            urlencoding::encode(&account.login)
        );
        let response = self
            .http
            .get_json::<Paginated<BitbucketRepo>, _>(&url, &params, HeaderMap::new())
            .await?;

        let body = response.body;
        let next = if body.values.is_empty() {
            None
        } else {
            next_cursor(body.next.as_deref())?
        };

        debug!(
            "Bitbucket {}: {} repositories, more: {}",
            account.login,
            body.values.len(),
            next.is_some()
        );

        Ok(RepositoryPage {
            repositories: body
                .values
                .into_iter()
                .map(|r| Repository::new(&r.name, &r.full_name))
                .collect(),
            next,
        })
    }
}
