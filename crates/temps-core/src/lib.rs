//! Core utilities and types shared across all Temps console crates

pub mod client;
pub mod error;
pub mod token_store;

// Re-export commonly used types
pub use client::{ApiClient, ApiError, AUTH_REDIRECT, REFRESH_TOKEN_HEADER};
pub use error::*;
pub use token_store::{MemoryTokenStore, TokenStore, API_TOKEN_KEY};

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
