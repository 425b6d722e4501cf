use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use temps_config::{ConsoleConfig, FileTokenStore};
use temps_core::TokenStore;
use temps_git::{
    BrowserStatus, BrowserView, GitProviderFactory, GitProviderType, Repository,
    RepositoryBrowser, RepositoryProvider,
};
use tracing::{debug, info};

#[derive(Args)]
pub struct ReposCommand {
    /// Git provider: github, gitlab or bitbucket
    #[arg(value_parser = super::parse_provider)]
    provider: GitProviderType,

    /// Account, group or workspace to list instead of the default one
    #[arg(long)]
    account: Option<String>,

    /// Load every page instead of only the first
    #[arg(long)]
    all: bool,

    /// Only show repositories whose name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Access token to use instead of the stored one
    #[arg(long, env = "TEMPS_GIT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

/// What a browsing run ended with
struct Listing {
    view: BrowserView,
    repositories: Vec<Repository>,
}

impl ReposCommand {
    pub fn execute(self, config: &ConsoleConfig) -> anyhow::Result<()> {
        let store = FileTokenStore::open(config.tokens_path())?;
        let token = self
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| store.get(self.provider.token_key()));

        let provider = GitProviderFactory::create_provider(self.provider, config, token)?;

        let rt = tokio::runtime::Runtime::new()?;
        let listing = rt.block_on(self.browse(provider))?;

        match listing.view.status {
            BrowserStatus::RequiresLogin => {
                self.print_login_hint(config);
                anyhow::bail!("{} login required", self.provider);
            }
            BrowserStatus::Errored => {
                let message = listing.view.error.unwrap_or_default();
                anyhow::bail!("{}", message);
            }
            _ => {}
        }

        print_listing(&listing, self.all);
        Ok(())
    }

    async fn browse(&self, provider: Arc<dyn RepositoryProvider>) -> anyhow::Result<Listing> {
        let browser = RepositoryBrowser::new(provider);

        let mut view = browser.init().await;
        if view.status != BrowserStatus::Loaded {
            browser.close().await;
            return Ok(Listing {
                view,
                repositories: Vec::new(),
            });
        }

        if let Some(account) = &self.account {
            let already_selected = view
                .selected_account
                .as_ref()
                .is_some_and(|a| &a.login == account);

            if !already_selected {
                if !view.accounts.iter().any(|a| &a.login == account) {
                    browser.close().await;
                    anyhow::bail!(
                        "No {} account named '{}'. Available: {}",
                        self.provider,
                        account,
                        view.accounts
                            .iter()
                            .map(|a| a.login.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                view = browser.switch_account(account).await;
            }
        }

        if self.all {
            view = browser.load_all().await;
        }
        debug!(
            "{} listing finished with {} repositories",
            self.provider,
            view.repositories.len()
        );

        let repositories = match &self.filter {
            Some(query) => browser.filtered(query).await,
            None => view.repositories.clone(),
        };

        browser.close().await;
        Ok(Listing { view, repositories })
    }

    fn print_login_hint(&self, config: &ConsoleConfig) {
        println!();
        println!(
            "{}",
            format!("No valid {} access token.", self.provider).bright_yellow()
        );
        println!(
            "  Store one with: {}",
            format!("temps-console login {} <token>", self.provider).bright_cyan()
        );
        if self.provider == GitProviderType::GitHub {
            if let Some(url) = config.github_install_url() {
                println!("  Install the GitHub App: {}", url.bright_cyan());
            }
        }
        println!();
    }
}

fn print_listing(listing: &Listing, all: bool) {
    let view = &listing.view;

    println!();
    println!(
        "{} {}",
        "Accounts on".bright_white().bold(),
        view.provider.to_string().bright_white().bold()
    );
    for account in &view.accounts {
        let marker = if account.selected { "*" } else { " " };
        println!(
            "  {} {} {}",
            marker.bright_green(),
            account.login,
            format!("({:?})", account.kind).to_lowercase().dimmed()
        );
    }

    println!();
    if listing.repositories.is_empty() {
        println!("{}", "No repositories found.".bright_yellow());
    } else {
        for repo in &listing.repositories {
            println!("  {}", repo.full_identifier);
        }
    }

    println!();
    println!(
        "{} {}",
        "Total repositories:".bright_white().bold(),
        listing.repositories.len()
    );
    if view.has_next_page && !all {
        println!(
            "{}",
            "More repositories are available, pass --all to load them.".dimmed()
        );
    }
    println!();

    info!(
        "Listed {} repositories for {}",
        listing.repositories.len(),
        view.selected_account
            .as_ref()
            .map(|a| a.login.as_str())
            .unwrap_or("-")
    );
}
