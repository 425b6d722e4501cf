//! File-backed token store
//!
//! Tokens live in a single JSON object at `<data_dir>/tokens.json`. The file is
//! read once when the store is opened and rewritten through a temp file on
//! every change.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use temps_core::{ServiceError, ServiceResult, TokenStore};
use tracing::{debug, warn};

use crate::service::ConfigServiceError;

pub const TOKENS_FILE_NAME: &str = "tokens.json";

pub struct FileTokenStore {
    path: PathBuf,
    tokens: RwLock<BTreeMap<String, String>>,
}

impl FileTokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigServiceError> {
        let path = path.into();
        let tokens = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    ConfigServiceError::Serialization(format!(
                        "{} is not a valid token file: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!("Opened token store at {} ({} entries)", path.display(), tokens.len());

        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tokens: &BTreeMap<String, String>) -> ServiceResult<()> {
        let storage_error = |e: std::io::Error| ServiceError::Storage {
            message: format!("Failed to write {}: {}", self.path.display(), e),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(storage_error)?;
        }

        let body = serde_json::to_string_pretty(tokens).map_err(|e| ServiceError::Storage {
            message: e.to_string(),
        })?;

        // A leftover temp file would keep its old permissions
        let tmp = self.path.with_extension("json.tmp");
        match fs::remove_file(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(storage_error(e)),
        }

        let mut file = private_file(&tmp).map_err(storage_error)?;
        file.write_all(body.as_bytes()).map_err(storage_error)?;
        file.sync_all().map_err(storage_error)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(storage_error)?;
        Ok(())
    }

    /// Apply `f` to a copy of the tokens and keep it only once it is on disk
    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> ServiceResult<()> {
        let mut tokens = self.tokens.write().map_err(|_| ServiceError::Storage {
            message: "token store lock poisoned".to_string(),
        })?;

        let mut next = tokens.clone();
        f(&mut next);
        self.persist(&next)?;
        *tokens = next;
        Ok(())
    }
}

/// Create `path` for writing, readable by the owner only on unix
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.tokens.read() {
            Ok(tokens) => tokens.get(key).filter(|t| !t.is_empty()).cloned(),
            Err(_) => {
                warn!("Token store lock poisoned, treating {} as missing", key);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> ServiceResult<()> {
        self.update(|tokens| {
            tokens.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> ServiceResult<()> {
        self.update(|tokens| {
            tokens.remove(key);
        })
    }
}
