use std::fs::OpenOptions;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session token must not be empty")]
    EmptyToken,

    #[error("Failed to write session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode session file: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Owner of the current session credential.
///
/// Every component reads the token through this trait and nothing else keeps
/// a copy beyond a single request.
pub trait TokenStore: Send + Sync {
    /// Current credential, if any
    fn get(&self) -> Option<String>;

    /// Persist a new credential. Empty tokens are rejected.
    fn set(&self, token: &str) -> Result<(), StoreError>;

    /// Remove the credential. Safe to call when nothing is stored.
    fn clear(&self);

    fn has_session(&self) -> bool {
        self.get().is_some()
    }

    /// When the current credential was stored, for backends that record it
    fn saved_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// `Authorization: Bearer <token>` when a credential is held, otherwise an
    /// empty map, so callers can merge it in unconditionally.
    fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.get() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value, omitting it"),
            }
        }
        headers
    }
}

pub(crate) fn validate_token(token: &str) -> Result<&str, StoreError> {
    if token.trim().is_empty() {
        Err(StoreError::EmptyToken)
    } else {
        Ok(token)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Token store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Result<Self, StoreError> {
        let token = validate_token(token)?;
        Ok(Self {
            token: RwLock::new(Some(token.to_string())),
        })
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        let token = validate_token(token)?;
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

// ============================================================================
// File-backed store
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    saved_at: DateTime<Utc>,
}

/// Token store persisted as a single `session.json` slot, so a session
/// survives restarts of the client.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    session: RwLock<Option<StoredSession>>,
}

impl FileTokenStore {
    /// Open the store in `dir`, loading any session saved there.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let path = dir.into().join(SESSION_FILE);
        let session = Self::load(&path);
        Self {
            path,
            session: RwLock::new(session),
        }
    }

    /// A missing or unreadable session file means no session.
    fn load(path: &Path) -> Option<StoredSession> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read session file");
                return None;
            }
        };
        match serde_json::from_str::<StoredSession>(&contents) {
            Ok(session) if !session.token.trim().is_empty() => Some(session),
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to the session slot, readable by the owner only.
    fn write_slot(&self, contents: &str) -> std::io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path)?;
        // `mode` only applies on creation; tighten slots written by older runs too
        #[cfg(unix)]
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.token.clone())
    }

    fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.saved_at)
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        let token = validate_token(token)?;
        let session = StoredSession {
            token: token.to_string(),
            saved_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&session)?;
        self.write_slot(&contents)?;

        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
        if !self.path.exists() {
            return;
        }

        // Blank the slot first so a failed removal cannot resurrect the token.
        let blank = StoredSession {
            token: String::new(),
            saved_at: Utc::now(),
        };
        let blanked = serde_json::to_string(&blank)
            .map_err(std::io::Error::from)
            .and_then(|contents| self.write_slot(&contents));
        if let Err(e) = blanked {
            warn!(path = %self.path.display(), error = %e, "Failed to blank session file");
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Session file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_auth_header_empty_without_token() {
        let store = MemoryTokenStore::new();
        assert!(!store.has_session());
        assert!(store.auth_header().is_empty());
    }

    #[test]
    fn test_auth_header_after_set() {
        let store = MemoryTokenStore::new();
        store.set("T").unwrap();

        let headers = store.auth_header();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer T");
        assert!(store.has_session());
    }

    #[test]
    fn test_set_rejects_empty_token() {
        let store = MemoryTokenStore::with_token("keep").unwrap();
        assert!(matches!(store.set(""), Err(StoreError::EmptyToken)));
        assert!(matches!(store.set("   "), Err(StoreError::EmptyToken)));
        assert_eq!(store.get().as_deref(), Some("keep"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = MemoryTokenStore::with_token("abc").unwrap();
        store.clear();
        store.clear();
        assert_eq!(store.get(), None);
        assert!(!store.has_session());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let store = FileTokenStore::open(dir.path());
        assert!(!store.has_session());
        store.set("persisted").unwrap();
        assert!(store.saved_at().is_some());

        let reopened = FileTokenStore::open(dir.path());
        assert_eq!(reopened.get().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_file_store_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::open(dir.path());
        store.set("gone-soon").unwrap();
        assert!(store.path().exists());

        store.clear();
        assert!(!store.path().exists());
        store.clear(); // nothing left to remove

        let reopened = FileTokenStore::open(dir.path());
        assert!(!reopened.has_session());
    }

    #[test]
    fn test_file_store_blank_slot_is_no_session() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SESSION_FILE),
            r#"{"token": "", "saved_at": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let store = FileTokenStore::open(dir.path());
        assert!(!store.has_session());
        assert_eq!(store.saved_at(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_clear_when_file_cannot_be_removed() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::open(dir.path());
        store.set("invalidated").unwrap();

        // A read-only directory blocks removal but not rewriting the slot.
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
        store.clear();
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!store.has_session());
        let reopened = FileTokenStore::open(dir.path());
        assert!(!reopened.has_session());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileTokenStore::open(dir.path());
        store.set("secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_store_has_no_timestamp() {
        let store = MemoryTokenStore::with_token("abc").unwrap();
        assert_eq!(store.saved_at(), None);
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "not json").unwrap();

        let store = FileTokenStore::open(dir.path());
        assert_eq!(store.get(), None);
    }
}
