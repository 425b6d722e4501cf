pub mod form;
pub mod login;
pub mod repos;

pub use form::FormCommand;
pub use login::{LoginCommand, LogoutCommand};
pub use repos::ReposCommand;

use temps_git::GitProviderType;

/// clap value parser for provider names
pub(crate) fn parse_provider(value: &str) -> Result<GitProviderType, String> {
    GitProviderType::try_from(value).map_err(|e| e.to_string())
}
