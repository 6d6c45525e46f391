use keyring::Entry;
use tracing::warn;

use super::store::{validate_token, StoreError, TokenStore};

const SERVICE_NAME: &str = "pubgame";

/// Keychain entry holding the session token
const ENTRY_NAME: &str = "session";

/// Token store backed by the OS keychain.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self, StoreError> {
        let entry = Entry::new(SERVICE_NAME, ENTRY_NAME)?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) if !token.trim().is_empty() => Some(token),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session token from keychain");
                None
            }
        }
    }

    fn set(&self, token: &str) -> Result<(), StoreError> {
        let token = validate_token(token)?;
        self.entry.set_password(token)?;
        Ok(())
    }

    fn clear(&self) {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "Failed to delete session token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a reachable OS keychain: `cargo test -- --ignored`
    #[test]
    #[ignore]
    fn test_token_survives_new_entry() {
        let writer = KeyringTokenStore::new().unwrap();
        writer.set("persist-me").unwrap();

        let reader = KeyringTokenStore::new().unwrap();
        assert_eq!(reader.get().as_deref(), Some("persist-me"));

        reader.clear();
        assert_eq!(KeyringTokenStore::new().unwrap().get(), None);
    }
}
