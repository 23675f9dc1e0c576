//! Durable storage for the credential pair.
//!
//! The access and refresh tokens live in two named slots in the OS keychain,
//! surviving restarts. The store is synchronous and makes no network calls;
//! it is safe to call from any task.

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "matchday";

const ACCESS_SLOT: &str = "access";
const REFRESH_SLOT: &str = "refresh";

/// Get/set/clear of the stored credential pair.
///
/// `clear` removes both slots; a missing slot is not an error, so every
/// terminal auth failure can converge on the same call.
pub trait CredentialStore: Send + Sync {
    fn access(&self) -> Result<Option<String>>;
    fn refresh_token(&self) -> Result<Option<String>>;
    fn set_access(&self, token: &str) -> Result<()>;
    fn set_refresh(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// OS keychain-backed store; the production implementation.
pub struct KeyringCredentials;

impl KeyringCredentials {
    pub fn new() -> Self {
        Self
    }

    fn entry(slot: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, slot).context("Failed to create keyring entry")
    }

    fn get(slot: &str) -> Result<Option<String>> {
        let entry = Self::entry(slot)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {slot} token")),
        }
    }

    fn set(slot: &str, value: &str) -> Result<()> {
        let entry = Self::entry(slot)?;
        entry
            .set_password(value)
            .with_context(|| format!("Failed to store {slot} token"))
    }

    fn delete(slot: &str) -> Result<()> {
        let entry = Self::entry(slot)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to delete {slot} token")),
        }
    }
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentials {
    fn access(&self) -> Result<Option<String>> {
        Self::get(ACCESS_SLOT)
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        Self::get(REFRESH_SLOT)
    }

    fn set_access(&self, token: &str) -> Result<()> {
        Self::set(ACCESS_SLOT, token)
    }

    fn set_refresh(&self, token: &str) -> Result<()> {
        Self::set(REFRESH_SLOT, token)
    }

    fn clear(&self) -> Result<()> {
        Self::delete(ACCESS_SLOT)?;
        Self::delete(REFRESH_SLOT)
    }
}

/// In-memory store for tests and embedded frontends without a keychain.
#[derive(Default)]
pub struct MemoryCredentials {
    inner: std::sync::RwLock<MemoryPair>,
}

#[derive(Default)]
struct MemoryPair {
    access: Option<String>,
    refresh: Option<String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        Self {
            inner: std::sync::RwLock::new(MemoryPair {
                access: access.map(str::to_string),
                refresh: refresh.map(str::to_string),
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryPair>> {
        self.inner
            .read()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryPair>> {
        self.inner
            .write()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentials {
    fn access(&self) -> Result<Option<String>> {
        Ok(self.read()?.access.clone())
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.read()?.refresh.clone())
    }

    fn set_access(&self, token: &str) -> Result<()> {
        self.write()?.access = Some(token.to_string());
        Ok(())
    }

    fn set_refresh(&self, token: &str) -> Result<()> {
        self.write()?.refresh = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut pair = self.write()?;
        pair.access = None;
        pair.refresh = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() -> Result<()> {
        let store = MemoryCredentials::new();
        assert_eq!(store.access()?, None);
        assert_eq!(store.refresh_token()?, None);

        store.set_access("A1")?;
        store.set_refresh("R1")?;
        assert_eq!(store.access()?.as_deref(), Some("A1"));
        assert_eq!(store.refresh_token()?.as_deref(), Some("R1"));

        store.set_access("A2")?;
        assert_eq!(store.access()?.as_deref(), Some("A2"));
        Ok(())
    }

    #[test]
    fn clear_removes_both_slots() -> Result<()> {
        let store = MemoryCredentials::with_tokens(Some("A1"), Some("R1"));
        store.clear()?;
        assert_eq!(store.access()?, None);
        assert_eq!(store.refresh_token()?, None);
        Ok(())
    }

    #[test]
    fn clear_on_empty_store_is_not_an_error() -> Result<()> {
        let store = MemoryCredentials::new();
        store.clear()?;
        store.clear()?;
        Ok(())
    }
}
