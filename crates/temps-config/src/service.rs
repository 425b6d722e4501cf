use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// Well-known paths relative to data_dir
pub const CONFIG_FILE_NAME: &str = "console.toml";

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
const DEFAULT_BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";
const DEFAULT_TIMEOUT_SECS: i64 = 30;
const DEFAULT_PER_PAGE: i64 = 30;
const MAX_PER_PAGE: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigServiceError {
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,

    // Git providers
    pub github_api_url: String,
    pub github_app_slug: Option<String>,
    pub gitlab_url: String,
    pub bitbucket_api_url: String,
    pub per_page: u32,
}

impl ConsoleConfig {
    /// Defaults rooted at the given data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: data_dir.into(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS as u64,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_app_slug: None,
            gitlab_url: DEFAULT_GITLAB_URL.to_string(),
            bitbucket_api_url: DEFAULT_BITBUCKET_API_URL.to_string(),
            per_page: DEFAULT_PER_PAGE as u32,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn get_data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.data_dir.join(crate::token_store::TOKENS_FILE_NAME)
    }

    /// Link that lets a user install the GitHub App on another account
    pub fn github_install_url(&self) -> Option<String> {
        self.github_app_slug
            .as_ref()
            .map(|slug| format!("https://github.com/apps/{}/installations/new", slug))
    }

    fn validate(mut self) -> Result<Self, ConfigServiceError> {
        for (field, value) in [
            ("api_url", &self.api_url),
            ("github_api_url", &self.github_api_url),
            ("gitlab_url", &self.gitlab_url),
            ("bitbucket_api_url", &self.bitbucket_api_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigServiceError::InvalidConfiguration {
                details: format!("{} '{}' is not a valid URL: {}", field, value, e),
            })?;
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigServiceError::InvalidConfiguration {
                details: "request_timeout_secs must be greater than zero".to_string(),
            });
        }

        self.per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        Ok(self)
    }
}

/// Loads [`ConsoleConfig`] from defaults, an optional TOML file and the environment
pub struct ConfigService {
    data_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            config_file: None,
            env_prefix: "TEMPS".to_string(),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn load(&self) -> Result<ConsoleConfig, ConfigServiceError> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => self.default_data_dir()?,
        };
        let config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        debug!("Loading console configuration from {}", config_file.display());

        let settings = config::Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("github_api_url", DEFAULT_GITHUB_API_URL)?
            .set_default("gitlab_url", DEFAULT_GITLAB_URL)?
            .set_default("bitbucket_api_url", DEFAULT_BITBUCKET_API_URL)?
            .set_default("per_page", DEFAULT_PER_PAGE)?
            .add_source(config::File::from(config_file).required(self.config_file.is_some()))
            .add_source(config::Environment::with_prefix(&self.env_prefix).try_parsing(true))
            .build()?;

        let config: ConsoleConfig = settings.try_deserialize()?;
        config.validate()
    }

    fn default_data_dir(&self) -> Result<PathBuf, ConfigServiceError> {
        if let Ok(dir) = std::env::var(format!("{}_DATA_DIR", self.env_prefix)) {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(".temps"))
            .ok_or_else(|| ConfigServiceError::InvalidConfiguration {
                details: "Could not find home directory; set TEMPS_DATA_DIR".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigService::new()
            .with_env_prefix("TEMPS_TEST_DEFAULTS")
            .with_data_dir(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.github_api_url, DEFAULT_GITHUB_API_URL);
        assert_eq!(config.gitlab_url, DEFAULT_GITLAB_URL);
        assert_eq!(config.per_page, 30);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.data_dir, dir.path());
        assert!(config.github_install_url().is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "api_url = \"https://console.example.com/api\"\nper_page = 500\ngithub_app_slug = \"temps-app\"\n",
        )
        .unwrap();

        let config = ConfigService::new()
            .with_env_prefix("TEMPS_TEST_FILE")
            .with_data_dir(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.api_url, "https://console.example.com/api");
        assert_eq!(config.per_page, 100);
        assert_eq!(
            config.github_install_url().as_deref(),
            Some("https://github.com/apps/temps-app/installations/new")
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "gitlab_url = \"https://gitlab.internal\"\n",
        )
        .unwrap();
        std::env::set_var("TEMPS_TEST_ENV_GITLAB_URL", "https://gitlab.example.org");
        std::env::set_var("TEMPS_TEST_ENV_REQUEST_TIMEOUT_SECS", "5");

        let config = ConfigService::new()
            .with_env_prefix("TEMPS_TEST_ENV")
            .with_data_dir(dir.path())
            .load()
            .unwrap();

        assert_eq!(config.gitlab_url, "https://gitlab.example.org");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "api_url = \"not a url\"\n").unwrap();

        let result = ConfigService::new()
            .with_env_prefix("TEMPS_TEST_INVALID")
            .with_data_dir(dir.path())
            .load();

        assert!(matches!(
            result,
            Err(ConfigServiceError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigService::new()
            .with_env_prefix("TEMPS_TEST_MISSING")
            .with_data_dir(dir.path())
            .with_config_file(dir.path().join("nope.toml"))
            .load();

        assert!(matches!(result, Err(ConfigServiceError::Source(_))));
    }
}
