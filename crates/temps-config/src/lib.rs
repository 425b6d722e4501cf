mod service;
mod token_store;

pub use service::{ConfigService, ConfigServiceError, ConsoleConfig, CONFIG_FILE_NAME};
pub use token_store::{FileTokenStore, TOKENS_FILE_NAME};
