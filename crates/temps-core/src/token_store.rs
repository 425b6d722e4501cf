//! Access token storage
//!
//! Sessions never read tokens from process-wide state. Each one is handed a
//! [`TokenStore`] and looks up the key it cares about when it starts.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{ServiceError, ServiceResult};

/// Key under which the platform backend token is stored
pub const API_TOKEN_KEY: &str = "api";

/// Persisted access tokens, one value per key
pub trait TokenStore: Send + Sync {
    /// Returns the token for `key`. Empty tokens are reported as missing.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> ServiceResult<()>;

    fn remove(&self, key: &str) -> ServiceResult<()>;
}

/// In-memory token store, used by tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut tokens) = store.tokens.write() {
            tokens.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        let tokens = self.tokens.read().ok()?;
        tokens.get(key).filter(|t| !t.is_empty()).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ServiceResult<()> {
        let mut tokens = self.tokens.write().map_err(|_| ServiceError::Storage {
            message: "token store lock poisoned".to_string(),
        })?;
        tokens.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ServiceResult<()> {
        let mut tokens = self.tokens.write().map_err(|_| ServiceError::Storage {
            message: "token store lock poisoned".to_string(),
        })?;
        tokens.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get("github"), None);

        store.set("github", "gho_abc").unwrap();
        assert_eq!(store.get("github"), Some("gho_abc".to_string()));

        store.remove("github").unwrap();
        assert_eq!(store.get("github"), None);
    }

    #[test]
    fn test_empty_token_is_missing() {
        let store = MemoryTokenStore::with_token("gitlab", "");
        assert_eq!(store.get("gitlab"), None);
    }
}
