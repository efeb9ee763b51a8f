//! Backing store interface and the in-memory reference implementation.
//!
//! The backing store is the canonical source of truth for state values,
//! addressed by (scope, key). The cache keeps a local, possibly stale,
//! possibly write-ahead copy and synchronizes through this interface.
//!
//! Transport failures surface as [`StateError::StoreUnavailable`]; the cache
//! never retries internally. Retry policy belongs to whoever owns the
//! transport.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use url::Url;

use strata_common::StateError;

/// Remote key-value service the cache synchronizes against.
///
/// Implementations must be safe to share across the worker's tasks; every
/// method may be called concurrently for different keys.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Declared total size of the value, in bytes.
    async fn value_size(&self, scope: &str, key: &str) -> Result<u64, StateError>;

    /// Ensure the value exists remotely and return its declared size.
    ///
    /// `source` is an optional locator the store may fetch the initial
    /// bytes from when it does not hold the value yet.
    async fn ensure_value(
        &self,
        scope: &str,
        key: &str,
        source: Option<&Url>,
    ) -> Result<u64, StateError>;

    /// Read the full value.
    async fn read_full(&self, scope: &str, key: &str) -> Result<Vec<u8>, StateError>;

    /// Read `length` bytes starting at `offset`.
    async fn read_range(
        &self,
        scope: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StateError>;

    /// Overwrite the full value.
    async fn write_full(&self, scope: &str, key: &str, data: &[u8]) -> Result<(), StateError>;

    /// Write `data` at `offset`, extending the value if needed.
    async fn write_range(
        &self,
        scope: &str,
        key: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StateError>;
}

/// In-memory backing store.
///
/// The reference implementation used by tests and by the single-process
/// worker. A networked backend plugs in through [`BackingStore`] without
/// touching the cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<(String, String), Vec<u8>>,

    /// Simulates a transport outage when set; every operation fails with
    /// `StoreUnavailable` until cleared.
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly, bypassing the cache. Intended for producers
    /// and tests.
    pub fn seed(&self, scope: impl Into<String>, key: impl Into<String>, data: Vec<u8>) {
        self.values.insert((scope.into(), key.into()), data);
    }

    /// The current remote bytes for a key, if any.
    pub fn value(&self, scope: &str, key: &str) -> Option<Vec<u8>> {
        self.values
            .get(&(scope.to_string(), key.to_string()))
            .map(|v| v.clone())
    }

    /// Toggle the simulated transport outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StateError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StateError::store_unavailable("memory store offline"));
        }
        Ok(())
    }

    fn key(scope: &str, key: &str) -> (String, String) {
        (scope.to_string(), key.to_string())
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn value_size(&self, scope: &str, key: &str) -> Result<u64, StateError> {
        self.check_available()?;
        self.values
            .get(&Self::key(scope, key))
            .map(|v| v.len() as u64)
            .ok_or_else(|| StateError::RemoteValueMissing {
                key: key.to_string(),
            })
    }

    async fn ensure_value(
        &self,
        scope: &str,
        key: &str,
        source: Option<&Url>,
    ) -> Result<u64, StateError> {
        self.check_available()?;
        if let Some(url) = source {
            // The in-memory store cannot fetch; a networked backend would
            // pull the initial bytes from here.
            debug!(key = %key, source = %url, "Source locator ignored by memory store");
        }
        self.value_size(scope, key).await
    }

    async fn read_full(&self, scope: &str, key: &str) -> Result<Vec<u8>, StateError> {
        self.check_available()?;
        self.values
            .get(&Self::key(scope, key))
            .map(|v| v.clone())
            .ok_or_else(|| StateError::RemoteValueMissing {
                key: key.to_string(),
            })
    }

    async fn read_range(
        &self,
        scope: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, StateError> {
        self.check_available()?;
        let value =
            self.values
                .get(&Self::key(scope, key))
                .ok_or_else(|| StateError::RemoteValueMissing {
                    key: key.to_string(),
                })?;

        let end = offset
            .checked_add(length)
            .filter(|&end| end <= value.len() as u64)
            .ok_or(StateError::RangeOutOfBounds {
                offset,
                length,
                size: value.len() as u64,
            })?;

        Ok(value[offset as usize..end as usize].to_vec())
    }

    async fn write_full(&self, scope: &str, key: &str, data: &[u8]) -> Result<(), StateError> {
        self.check_available()?;
        self.values.insert(Self::key(scope, key), data.to_vec());
        Ok(())
    }

    async fn write_range(
        &self,
        scope: &str,
        key: &str,
        offset: u64,
        data: &[u8],
    ) -> Result<(), StateError> {
        self.check_available()?;
        let mut value = self.values.entry(Self::key(scope, key)).or_default();

        let end = offset as usize + data.len();
        if value.len() < end {
            value.resize(end, 0);
        }
        value[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_and_size() {
        let store = MemoryStore::new();
        store.seed("user", "counter", vec![0, 0, 0, 0]);

        assert_eq!(store.value_size("user", "counter").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_missing_value() {
        let store = MemoryStore::new();
        let err = store.value_size("user", "missing").await.unwrap_err();

        assert!(matches!(err, StateError::RemoteValueMissing { .. }));
    }

    #[tokio::test]
    async fn test_read_range() {
        let store = MemoryStore::new();
        store.seed("user", "k", vec![1, 2, 3, 4, 5]);

        let bytes = store.read_range("user", "k", 1, 3).await.unwrap();
        assert_eq!(bytes, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_read_range_out_of_bounds() {
        let store = MemoryStore::new();
        store.seed("user", "k", vec![1, 2, 3]);

        let err = store.read_range("user", "k", 2, 5).await.unwrap_err();
        assert!(matches!(err, StateError::RangeOutOfBounds { .. }));
    }

    #[tokio::test]
    async fn test_write_range_extends_value() {
        let store = MemoryStore::new();

        store.write_range("user", "k", 4, &[9, 9]).await.unwrap();
        assert_eq!(store.value("user", "k").unwrap(), vec![0, 0, 0, 0, 9, 9]);
    }

    #[tokio::test]
    async fn test_scopes_are_distinct() {
        let store = MemoryStore::new();
        store.seed("alice", "k", vec![1]);
        store.seed("bob", "k", vec![2]);

        assert_eq!(store.read_full("alice", "k").await.unwrap(), vec![1]);
        assert_eq!(store.read_full("bob", "k").await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = MemoryStore::new();
        store.seed("user", "k", vec![1]);
        store.set_unavailable(true);

        let err = store.read_full("user", "k").await.unwrap_err();
        assert!(err.is_recoverable());

        store.set_unavailable(false);
        assert!(store.read_full("user", "k").await.is_ok());
    }
}
