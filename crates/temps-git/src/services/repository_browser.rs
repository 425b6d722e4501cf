//! Repository browsing session
//!
//! A [`RepositoryBrowser`] owns the state of one "pick a repository" view for
//! a single provider. State changes go through [`BrowserAction`]s applied by a
//! reducer, so a session is always in exactly one [`BrowserState`].
//!
//! Every request is tagged with the session generation it was issued under.
//! Switching accounts, re-initializing, logging out or closing bumps the
//! generation and cancels the in-flight request; a response that still
//! arrives for an older generation is discarded.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use temps_core::{ServiceResult, TokenStore, GENERIC_ERROR_MESSAGE};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::git_provider::{
    Account, GitProviderError, GitProviderType, PageCursor, Repository, RepositoryPage,
    RepositoryProvider,
};

/// Accounts and accumulated repositories of an authenticated session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub accounts: Vec<Account>,
    pub repositories: Vec<Repository>,
    pub next: Option<PageCursor>,
}

impl Listing {
    fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            ..Default::default()
        }
    }

    pub fn selected(&self) -> Option<&Account> {
        self.accounts.iter().find(|a| a.selected)
    }

    fn append(&mut self, page: RepositoryPage) {
        self.repositories.extend(page.repositories);
        self.next = page.next;
    }

    fn select(&mut self, login: &str) {
        for account in &mut self.accounts {
            account.selected = account.login == login;
        }
        self.repositories.clear();
        self.next = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserState {
    Uninitialized,
    RequiresLogin,
    Authenticated(Listing),
    Loading(Listing),
    Loaded(Listing),
    Errored {
        message: String,
        listing: Option<Listing>,
    },
    Closed,
}

impl BrowserState {
    pub fn status(&self) -> BrowserStatus {
        match self {
            BrowserState::Uninitialized => BrowserStatus::Uninitialized,
            BrowserState::RequiresLogin => BrowserStatus::RequiresLogin,
            BrowserState::Authenticated(_) => BrowserStatus::Authenticated,
            BrowserState::Loading(_) => BrowserStatus::Loading,
            BrowserState::Loaded(_) => BrowserStatus::Loaded,
            BrowserState::Errored { .. } => BrowserStatus::Errored,
            BrowserState::Closed => BrowserStatus::Closed,
        }
    }

    pub fn listing(&self) -> Option<&Listing> {
        match self {
            BrowserState::Authenticated(listing)
            | BrowserState::Loading(listing)
            | BrowserState::Loaded(listing) => Some(listing),
            BrowserState::Errored { listing, .. } => listing.as_ref(),
            _ => None,
        }
    }

    fn into_listing(self) -> Option<Listing> {
        match self {
            BrowserState::Authenticated(listing)
            | BrowserState::Loading(listing)
            | BrowserState::Loaded(listing) => Some(listing),
            BrowserState::Errored { listing, .. } => listing,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserStatus {
    Uninitialized,
    RequiresLogin,
    Authenticated,
    Loading,
    Loaded,
    Errored,
    Closed,
}

#[derive(Debug, Clone)]
pub enum BrowserAction {
    Reset,
    LoginRequired,
    AccountsLoaded {
        generation: u64,
        accounts: Vec<Account>,
    },
    PageRequested,
    PageLoaded {
        generation: u64,
        page: RepositoryPage,
    },
    AccountSwitched {
        login: String,
    },
    /// The provider rejected the token on a request of `generation`
    Unauthorized {
        generation: u64,
    },
    Failed {
        generation: u64,
        message: String,
    },
    Closed,
}

/// Flattened view of a session, as a UI would render it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserView {
    pub provider: GitProviderType,
    pub status: BrowserStatus,
    pub accounts: Vec<Account>,
    pub selected_account: Option<Account>,
    pub repositories: Vec<Repository>,
    pub loading: bool,
    pub requires_login: bool,
    pub has_next_page: bool,
    pub cursor: Option<PageCursor>,
    pub error: Option<String>,
}

struct Session {
    state: BrowserState,
    generation: u64,
    root: CancellationToken,
    current: CancellationToken,
}

impl Session {
    fn new() -> Self {
        let root = CancellationToken::new();
        let current = root.child_token();
        Self {
            state: BrowserState::Uninitialized,
            generation: 0,
            root,
            current,
        }
    }

    /// Abandon whatever is in flight and start a new generation
    fn next_generation(&mut self) -> (u64, CancellationToken) {
        self.current.cancel();
        self.current = self.root.child_token();
        self.generation += 1;
        (self.generation, self.current.clone())
    }

    fn dispatch(&mut self, action: BrowserAction) {
        let state = std::mem::replace(&mut self.state, BrowserState::Uninitialized);
        self.state = reduce(state, action, self.generation);
    }
}

fn reduce(state: BrowserState, action: BrowserAction, generation: u64) -> BrowserState {
    use BrowserAction as A;
    use BrowserState as S;

    match (state, action) {
        (S::Closed, _) => S::Closed,
        (_, A::Closed) => S::Closed,
        (_, A::Reset) => S::Uninitialized,
        (_, A::LoginRequired) => S::RequiresLogin,

        (S::Uninitialized, A::AccountsLoaded { generation: g, accounts }) if g == generation => {
            S::Authenticated(Listing::new(accounts))
        }

        (
            state @ (S::Authenticated(_) | S::Loaded(_) | S::Errored { listing: Some(_), .. }),
            A::PageRequested,
        ) => match state.into_listing() {
            Some(listing) => S::Loading(listing),
            None => S::Uninitialized,
        },

        (S::Loading(mut listing), A::PageLoaded { generation: g, page }) if g == generation => {
            listing.append(page);
            S::Loaded(listing)
        }

        (state, A::AccountSwitched { login }) => match state.into_listing() {
            Some(mut listing) => {
                listing.select(&login);
                S::Authenticated(listing)
            }
            None => S::Uninitialized,
        },

        (_, A::Unauthorized { generation: g }) if g == generation => S::RequiresLogin,

        (state, A::Failed { generation: g, message }) if g == generation => S::Errored {
            message,
            listing: state.into_listing(),
        },

        (state, action) => {
            warn!(
                "Ignoring {:?} in state {:?}",
                ActionKind(&action),
                state.status()
            );
            state
        }
    }
}

/// Debug helper that leaves out repository payloads
struct ActionKind<'a>(&'a BrowserAction);

impl std::fmt::Debug for ActionKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            BrowserAction::PageLoaded { generation, page } => write!(
                f,
                "PageLoaded(generation {}, {} repositories)",
                generation,
                page.repositories.len()
            ),
            BrowserAction::AccountsLoaded { generation, accounts } => write!(
                f,
                "AccountsLoaded(generation {}, {} accounts)",
                generation,
                accounts.len()
            ),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One repository-browsing session for a single provider
pub struct RepositoryBrowser {
    provider: Arc<dyn RepositoryProvider>,
    provider_type: GitProviderType,
    session: Mutex<Session>,
}

impl RepositoryBrowser {
    pub fn new(provider: Arc<dyn RepositoryProvider>) -> Self {
        let provider_type = provider.provider_type();
        Self {
            provider,
            provider_type,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn provider_type(&self) -> GitProviderType {
        self.provider_type
    }

    pub async fn state(&self) -> BrowserState {
        self.session.lock().await.state.clone()
    }

    pub async fn view(&self) -> BrowserView {
        let session = self.session.lock().await;
        self.view_of(&session.state)
    }

    fn view_of(&self, state: &BrowserState) -> BrowserView {
        let listing = state.listing();
        let error = match state {
            BrowserState::Errored { message, .. } => Some(message.clone()),
            _ => None,
        };

        BrowserView {
            provider: self.provider_type,
            status: state.status(),
            accounts: listing.map(|l| l.accounts.clone()).unwrap_or_default(),
            selected_account: listing.and_then(|l| l.selected().cloned()),
            repositories: listing.map(|l| l.repositories.clone()).unwrap_or_default(),
            loading: matches!(state, BrowserState::Loading(_)),
            requires_login: matches!(state, BrowserState::RequiresLogin),
            has_next_page: listing.is_some_and(|l| l.next.is_some()),
            cursor: listing.and_then(|l| l.next.clone()),
            error,
        }
    }

    /// Authenticate, load accounts and the first page of repositories for
    /// the default account. Without a stored token the session goes straight
    /// to `RequiresLogin` and nothing is requested.
    pub async fn init(&self) -> BrowserView {
        let (generation, cancel) = {
            let mut session = self.session.lock().await;
            if session.state == BrowserState::Closed {
                return self.view_of(&session.state);
            }
            let next = session.next_generation();
            session.dispatch(BrowserAction::Reset);

            if !self.provider.has_access_token() {
                info!("No {} access token stored, login required", self.provider_type);
                session.dispatch(BrowserAction::LoginRequired);
                return self.view_of(&session.state);
            }
            next
        };

        let provider = self.provider.clone();
        let result = guarded(&cancel, async move {
            let user = provider.user().await?;
            let mut accounts = provider.accounts(&user).await?;
            if let Some(index) = provider.default_account(&user, &accounts) {
                accounts[index].selected = true;
            }
            Ok::<_, GitProviderError>(accounts)
        })
        .await;

        match result {
            None => {
                debug!("{} init cancelled", self.provider_type);
                return self.view().await;
            }
            Some(Err(e)) => return self.fail(generation, e).await,
            Some(Ok(accounts)) => {
                info!(
                    "{} session authenticated with {} accounts",
                    self.provider_type,
                    accounts.len()
                );
                let mut session = self.session.lock().await;
                session.dispatch(BrowserAction::AccountsLoaded {
                    generation,
                    accounts,
                });
            }
        }

        self.list_repositories(None).await
    }

    /// Fetch one page for the selected account and append it to the list.
    /// Does nothing while another page is loading.
    pub async fn list_repositories(&self, cursor: Option<PageCursor>) -> BrowserView {
        let (generation, cancel, account) = {
            let mut session = self.session.lock().await;
            let account = match &session.state {
                BrowserState::Authenticated(listing)
                | BrowserState::Loaded(listing)
                | BrowserState::Errored {
                    listing: Some(listing),
                    ..
                } => listing.selected().cloned(),
                BrowserState::Loading(_) => {
                    debug!("{} page already loading", self.provider_type);
                    return self.view_of(&session.state);
                }
                _ => return self.view_of(&session.state),
            };

            session.dispatch(BrowserAction::PageRequested);
            let generation = session.generation;

            let Some(account) = account else {
                // Nothing to list, e.g. the app is not installed anywhere yet
                session.dispatch(BrowserAction::PageLoaded {
                    generation,
                    page: RepositoryPage::default(),
                });
                return self.view_of(&session.state);
            };
            (generation, session.current.clone(), account)
        };

        let result = guarded(&cancel, self.provider.repositories(&account, cursor)).await;

        match result {
            None => {
                debug!(
                    "{} listing for {} cancelled",
                    self.provider_type, account.login
                );
                self.view().await
            }
            Some(Err(e)) => self.fail(generation, e).await,
            Some(Ok(page)) => {
                let mut session = self.session.lock().await;
                session.dispatch(BrowserAction::PageLoaded { generation, page });
                self.view_of(&session.state)
            }
        }
    }

    /// Load the page after the last one fetched, if there is one
    pub async fn load_next_page(&self) -> BrowserView {
        let next = {
            let session = self.session.lock().await;
            session.state.listing().and_then(|l| l.next.clone())
        };

        match next {
            Some(cursor) => self.list_repositories(Some(cursor)).await,
            None => self.view().await,
        }
    }

    /// Keep loading pages until the listing is exhausted or a request fails
    pub async fn load_all(&self) -> BrowserView {
        let mut view = self.view().await;
        while view.has_next_page {
            let before = view.repositories.len();
            view = self.load_next_page().await;
            if view.status != BrowserStatus::Loaded || view.repositories.len() == before {
                break;
            }
        }
        view
    }

    /// Select another account: the list and cursor are cleared, the request
    /// for the previous account is cancelled, and the first page is loaded
    pub async fn switch_account(&self, login: &str) -> BrowserView {
        {
            let mut session = self.session.lock().await;
            let known = session
                .state
                .listing()
                .is_some_and(|l| l.accounts.iter().any(|a| a.login == login));
            if !known {
                warn!("{} has no account named {}", self.provider_type, login);
                return self.view_of(&session.state);
            }

            session.next_generation();
            session.dispatch(BrowserAction::AccountSwitched {
                login: login.to_string(),
            });
            info!("{} switched to account {}", self.provider_type, login);
        }

        self.list_repositories(None).await
    }

    /// Forget the stored token and ask for a new login
    pub async fn logout(&self, store: &dyn TokenStore) -> ServiceResult<BrowserView> {
        store.remove(self.provider_type.token_key())?;

        let mut session = self.session.lock().await;
        session.next_generation();
        session.dispatch(BrowserAction::LoginRequired);
        Ok(self.view_of(&session.state))
    }

    /// Tear the session down. In-flight requests are cancelled and every
    /// later operation is a no-op.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        session.root.cancel();
        session.dispatch(BrowserAction::Closed);
    }

    /// Accumulated repositories whose name contains `query`, ignoring case
    pub async fn filtered(&self, query: &str) -> Vec<Repository> {
        let session = self.session.lock().await;
        let Some(listing) = session.state.listing() else {
            return Vec::new();
        };

        let query = query.to_lowercase();
        listing
            .repositories
            .iter()
            .filter(|r| query.is_empty() || r.name.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    async fn fail(&self, generation: u64, err: GitProviderError) -> BrowserView {
        let mut session = self.session.lock().await;
        if err.is_unauthorized() {
            warn!("{} rejected the access token", self.provider_type);
            session.dispatch(BrowserAction::Unauthorized { generation });
        } else {
            error!("{} request failed: {}", self.provider_type, err);
            session.dispatch(BrowserAction::Failed {
                generation,
                message: GENERIC_ERROR_MESSAGE.to_string(),
            });
        }
        self.view_of(&session.state)
    }
}

/// Run `fut` unless `cancel` fires first
async fn guarded<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
