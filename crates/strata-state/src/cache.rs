//! The state synchronization engine's entry registry.
//!
//! This module provides [`StateCache`], the process-scoped registry of
//! cached state values. Entries are created on first access to a (scope,
//! key) pair, keep their size for their whole lifetime, and are only
//! destroyed together at [`clear`](StateCache::clear) or process teardown.
//! No per-entry eviction policy exists in this design.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use url::Url;

use strata_common::{StateConfig, StateError};

use crate::entry::StateEntry;
use crate::store::BackingStore;

/// Registry key: two different scopes with the same key string refer to
/// distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
    /// Owner/user namespace.
    pub scope: String,

    /// State key within the scope.
    pub key: String,
}

impl ScopedKey {
    /// Create a new scoped key.
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }
}

/// Process-scoped cache of state entries, backed by a remote store.
///
/// The cache mediates every pull and push; the entries it hands out share
/// its backing-store handle and stay registered until teardown.
pub struct StateCache {
    store: Arc<dyn BackingStore>,
    entries: DashMap<ScopedKey, Arc<StateEntry>>,
    default_scope: String,
}

impl StateCache {
    /// Create a cache over the given backing store.
    pub fn new(store: Arc<dyn BackingStore>, config: &StateConfig) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            default_scope: config.default_scope.clone(),
        }
    }

    /// The backing store this cache synchronizes against.
    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// Get or create the entry for (scope, key).
    ///
    /// A non-zero `size_hint` fixes the size of a newly created entry; for
    /// an existing entry the hint is ignored (the size established at
    /// creation stays authoritative). A zero hint only looks up an existing
    /// entry.
    ///
    /// # Errors
    ///
    /// With a zero `size_hint`, returns [`StateError::KeyNotInitialized`]
    /// if no entry exists yet.
    pub fn entry(
        &self,
        scope: &str,
        key: &str,
        size_hint: u64,
    ) -> Result<Arc<StateEntry>, StateError> {
        if size_hint == 0 {
            return self.existing(scope, key);
        }

        let scope = self.resolve_scope(scope);
        let scoped = ScopedKey::new(scope.clone(), key);

        let entry = self
            .entries
            .entry(scoped)
            .or_insert_with(|| {
                debug!(scope = %scope, key = %key, size = size_hint, "Creating state entry");
                Arc::new(StateEntry::new(
                    scope.clone(),
                    key,
                    size_hint,
                    Arc::clone(&self.store),
                ))
            })
            .clone();

        Ok(entry)
    }

    /// Look up an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::KeyNotInitialized`] if no entry exists for
    /// (scope, key).
    pub fn existing(&self, scope: &str, key: &str) -> Result<Arc<StateEntry>, StateError> {
        let scope = self.resolve_scope(scope);
        self.entries
            .get(&ScopedKey::new(scope, key))
            .map(|e| e.clone())
            .ok_or_else(|| StateError::key_not_initialized(key))
    }

    /// Ensure an entry exists for (scope, key), establishing its total size
    /// from the backing store when it is not yet known locally.
    ///
    /// Idempotent: a second call returns the same size and does not touch
    /// the entry's buffer or dirty state. No bytes are transferred; the
    /// first pull does that.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidSourceLocator`] if `source` does not
    /// parse as a URL, or a store error if the declared size cannot be
    /// fetched.
    pub async fn init_state(
        &self,
        scope: &str,
        key: &str,
        source: Option<&str>,
    ) -> Result<u64, StateError> {
        let scope = self.resolve_scope(scope);

        if let Some(entry) = self.entries.get(&ScopedKey::new(scope.clone(), key)) {
            return Ok(entry.size());
        }

        let url = source
            .map(|s| {
                Url::parse(s).map_err(|_| StateError::InvalidSourceLocator {
                    locator: s.to_string(),
                })
            })
            .transpose()?;

        let size = self
            .store
            .ensure_value(&scope, key, url.as_ref())
            .await?;

        // A racing init_state for the same key keeps the first entry
        let entry = self
            .entries
            .entry(ScopedKey::new(scope.clone(), key))
            .or_insert_with(|| {
                Arc::new(StateEntry::new(
                    scope.clone(),
                    key,
                    size,
                    Arc::clone(&self.store),
                ))
            })
            .clone();

        info!(scope = %scope, key = %key, size = entry.size(), "Initialized state key");
        Ok(entry.size())
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. The documented teardown point at the end of a
    /// worker's lifetime.
    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        info!(entries = dropped, "State cache cleared");
    }

    fn resolve_scope(&self, scope: &str) -> String {
        if scope.is_empty() {
            debug!(default_scope = %self.default_scope, "Empty scope, using default");
            self.default_scope.clone()
        } else {
            scope.to_string()
        }
    }
}

impl std::fmt::Debug for StateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCache")
            .field("entries", &self.entries.len())
            .field("default_scope", &self.default_scope)
            .finish_non_exhaustive()
    }
}
