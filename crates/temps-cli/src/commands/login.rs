use clap::Args;
use colored::Colorize;
use temps_config::{ConsoleConfig, FileTokenStore};
use temps_core::TokenStore;
use temps_git::GitProviderType;
use tracing::info;

#[derive(Args)]
pub struct LoginCommand {
    /// Git provider: github, gitlab or bitbucket
    #[arg(value_parser = super::parse_provider)]
    provider: GitProviderType,

    /// Personal access token or OAuth token
    token: String,
}

impl LoginCommand {
    pub fn execute(self, config: &ConsoleConfig) -> anyhow::Result<()> {
        let token = self.token.trim();
        if token.is_empty() {
            anyhow::bail!("Token must not be empty");
        }

        let store = FileTokenStore::open(config.tokens_path())?;
        store.set(self.provider.token_key(), token)?;
        info!("Stored {} token in {}", self.provider, store.path().display());

        println!(
            "{} {} token saved",
            "✓".bright_green(),
            self.provider.to_string().bright_white().bold()
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct LogoutCommand {
    /// Git provider: github, gitlab or bitbucket
    #[arg(value_parser = super::parse_provider)]
    provider: GitProviderType,
}

impl LogoutCommand {
    pub fn execute(self, config: &ConsoleConfig) -> anyhow::Result<()> {
        let store = FileTokenStore::open(config.tokens_path())?;
        store.remove(self.provider.token_key())?;
        info!("Removed {} token", self.provider);

        println!(
            "{} {} token removed",
            "✓".bright_green(),
            self.provider.to_string().bright_white().bold()
        );
        Ok(())
    }
}
