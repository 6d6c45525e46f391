//! Authentication module for holding the session credential and reacting
//! to its invalidation.
//!
//! This module provides:
//! - `TokenStore`: the single owner of the bearer token, with memory, file
//!   and OS keychain backends
//! - `SessionGuard`: clears the store and redirects to the login entry point
//!   when the backend answers `401`
//! - `Navigator`: the redirect capability the guard drives

pub mod guard;
pub mod keychain;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::{Config, TokenBackend};

pub use guard::{HistoryNavigator, Navigator, SessionGuard, DEFAULT_LOGIN_PATH};
pub use keychain::KeyringTokenStore;
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};

/// Open the token store selected by the configuration.
pub fn open_token_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    open_backend(config.token_backend, || config.cache_dir())
}

/// `cache_dir` is only resolved for the file backend.
fn open_backend<F>(backend: TokenBackend, cache_dir: F) -> Result<Arc<dyn TokenStore>>
where
    F: FnOnce() -> Result<PathBuf>,
{
    debug!(?backend, "Opening token store");
    let store: Arc<dyn TokenStore> = match backend {
        TokenBackend::Memory => Arc::new(MemoryTokenStore::new()),
        TokenBackend::File => Arc::new(FileTokenStore::open(cache_dir()?)),
        TokenBackend::Keyring => Arc::new(
            KeyringTokenStore::new().context("Failed to open keychain token store")?,
        ),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_cache_dir() -> Result<PathBuf> {
        Err(anyhow::anyhow!("cache dir must not be resolved"))
    }

    #[test]
    fn test_memory_backend_starts_empty() {
        let store = open_backend(TokenBackend::Memory, no_cache_dir).unwrap();
        assert!(!store.has_session());
        store.set("abc").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc"));
    }

    #[test]
    fn test_file_backend_uses_cache_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let store = open_backend(TokenBackend::File, || Ok(path.clone())).unwrap();
        store.set("on-disk").unwrap();
        assert!(dir.path().join("session.json").exists());

        let reopened = open_backend(TokenBackend::File, || Ok(path.clone())).unwrap();
        assert_eq!(reopened.get().as_deref(), Some("on-disk"));
    }

    #[test]
    fn test_file_backend_propagates_cache_dir_error() {
        assert!(open_backend(TokenBackend::File, no_cache_dir).is_err());
    }
}
