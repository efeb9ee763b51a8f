//! One cached state value and its synchronization operations.
//!
//! A [`StateEntry`] holds the local copy of a single (scope, key) value:
//! its fixed total size, a local byte buffer, the set of dirty ranges not
//! yet pushed, and a freshness flag recording whether the value was ever
//! pulled from the backing store.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};

use strata_common::StateError;

use crate::dirty::{ByteRange, DirtySet};
use crate::store::BackingStore;

/// One cached value for a (scope, key) pair.
///
/// The total size is authoritative and fixed at creation. The local buffer
/// may lag behind the remote value (until a pull) or run ahead of it (until
/// a push); the dirty set tracks exactly which bytes run ahead.
///
/// # Concurrency
///
/// All internal state sits behind one async mutex, so concurrent
/// invocations can share an entry safely. On top of that, each entry
/// carries a guest-visible read/write lock ([`read_lock`](Self::read_lock),
/// [`write_lock`](Self::write_lock)) for callers that need a whole
/// read-modify-write sequence to be exclusive.
pub struct StateEntry {
    scope: String,
    key: String,
    size: u64,
    store: Arc<dyn BackingStore>,
    inner: Mutex<EntryInner>,
    guest_lock: Arc<RwLock<()>>,
}

struct EntryInner {
    buffer: Vec<u8>,
    dirty: DirtySet,
    /// Has this entry ever been brought up to date from the store?
    fresh: bool,
}

impl StateEntry {
    /// Create an entry with a fixed total size and a zeroed local buffer.
    pub fn new(
        scope: impl Into<String>,
        key: impl Into<String>,
        size: u64,
        store: Arc<dyn BackingStore>,
    ) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
            size,
            store,
            inner: Mutex::new(EntryInner {
                buffer: vec![0; size as usize],
                dirty: DirtySet::new(),
                fresh: false,
            }),
            guest_lock: Arc::new(RwLock::new(())),
        }
    }

    /// The owning scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The state key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Total logical size of the value, fixed at creation.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the entry has been pulled from the store.
    pub async fn is_fresh(&self) -> bool {
        self.inner.lock().await.fresh
    }

    /// The current dirty intervals, sorted by offset.
    pub async fn dirty_ranges(&self) -> Vec<ByteRange> {
        self.inner.lock().await.dirty.ranges()
    }

    /// Bring the local buffer up to date from the backing store, blocking
    /// until the transfer completes.
    ///
    /// A no-op once the entry is fresh. Remote bytes are only copied into
    /// the clean gaps of the buffer: bytes written locally before the first
    /// pull stay intact and stay dirty.
    ///
    /// # Errors
    ///
    /// Surfaces backing-store unavailability to the caller; no retry is
    /// attempted here.
    pub async fn pull(&self) -> Result<(), StateError> {
        {
            let inner = self.inner.lock().await;
            if inner.fresh {
                return Ok(());
            }
        }

        // Transfer without holding the entry lock
        let remote = self.store.read_full(&self.scope, &self.key).await?;

        let mut inner = self.inner.lock().await;
        if inner.fresh {
            // A concurrent pull completed first
            return Ok(());
        }

        let gaps = inner.dirty.gaps(self.size);
        for gap in gaps {
            let start = gap.offset as usize;
            let end = (gap.end() as usize).min(remote.len());
            if start < end {
                inner.buffer[start..end].copy_from_slice(&remote[start..end]);
            }
        }
        inner.fresh = true;

        debug!(scope = %self.scope, key = %self.key, size = self.size, "Pulled state value");
        Ok(())
    }

    /// Enqueue a pull on a background task and return immediately.
    ///
    /// Readers must tolerate stale bytes until a later blocking
    /// synchronization point. A transfer failure is logged; the entry simply
    /// stays unfresh.
    pub fn pull_deferred(self: &Arc<Self>) {
        let entry = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = entry.pull().await {
                warn!(
                    scope = %entry.scope,
                    key = %entry.key,
                    error = %e,
                    "Deferred pull failed"
                );
            }
        });
    }

    /// The full current local value. Does not implicitly pull.
    pub async fn get(&self) -> Vec<u8> {
        self.inner.lock().await.buffer.clone()
    }

    /// Copy the full current local value into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SizeMismatch`] if `target` is smaller than the
    /// value.
    pub async fn copy_to(&self, target: &mut [u8]) -> Result<(), StateError> {
        if (target.len() as u64) < self.size {
            return Err(StateError::SizeMismatch {
                got: target.len() as u64,
                size: self.size,
            });
        }
        let inner = self.inner.lock().await;
        target[..self.size as usize].copy_from_slice(&inner.buffer);
        Ok(())
    }

    /// A byte range of the local value. The caller is responsible for
    /// having pulled beforehand if freshness matters.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::RangeOutOfBounds`] if `offset + length`
    /// exceeds the total size.
    pub async fn get_segment(&self, offset: u64, length: u64) -> Result<Vec<u8>, StateError> {
        self.check_range(offset, length)?;
        let inner = self.inner.lock().await;
        Ok(inner.buffer[offset as usize..(offset + length) as usize].to_vec())
    }

    /// Overwrite the whole local value and mark it fully dirty.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SizeMismatch`] if `data` does not match the
    /// entry's fixed total size.
    pub async fn set(&self, data: &[u8]) -> Result<(), StateError> {
        if data.len() as u64 != self.size {
            return Err(StateError::SizeMismatch {
                got: data.len() as u64,
                size: self.size,
            });
        }
        let mut inner = self.inner.lock().await;
        inner.buffer.copy_from_slice(data);
        inner.dirty.mark_all(self.size);
        Ok(())
    }

    /// Overwrite part of the local value and mark that range dirty.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::RangeOutOfBounds`] if the write exceeds the
    /// total size.
    pub async fn set_segment(&self, offset: u64, data: &[u8]) -> Result<(), StateError> {
        self.check_range(offset, data.len() as u64)?;
        let mut inner = self.inner.lock().await;
        inner.buffer[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        inner.dirty.mark(offset, data.len() as u64);
        Ok(())
    }

    /// Mark the whole value dirty without writing it.
    ///
    /// Supports callers that mutate the buffer by other means (e.g., through
    /// a mapped view) and then flag what changed.
    pub async fn flag_dirty(&self) {
        self.inner.lock().await.dirty.mark_all(self.size);
    }

    /// Mark a range dirty without writing it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::RangeOutOfBounds`] if the range exceeds the
    /// total size.
    pub async fn flag_segment_dirty(&self, offset: u64, length: u64) -> Result<(), StateError> {
        self.check_range(offset, length)?;
        self.inner.lock().await.dirty.mark(offset, length);
        Ok(())
    }

    /// Transfer the entire local value to the backing store and clear all
    /// dirty tracking.
    ///
    /// # Errors
    ///
    /// On a store failure the dirty set is restored, so no local write is
    /// lost.
    pub async fn push_full(&self) -> Result<(), StateError> {
        let (snapshot, drained) = {
            let mut inner = self.inner.lock().await;
            (inner.buffer.clone(), inner.dirty.take())
        };

        match self.store.write_full(&self.scope, &self.key, &snapshot).await {
            Ok(()) => {
                let mut inner = self.inner.lock().await;
                // The local copy now matches the remote value
                inner.fresh = true;
                debug!(scope = %self.scope, key = %self.key, "Pushed full state value");
                Ok(())
            }
            Err(e) => {
                self.inner.lock().await.dirty.merge_from(&drained);
                Err(e)
            }
        }
    }

    /// Transfer only the current dirty ranges to the backing store, each as
    /// an independent offset-addressed write, and clear exactly those
    /// ranges.
    ///
    /// Ranges dirtied after the transfer snapshot remain dirty. On a store
    /// failure the untransferred ranges are restored.
    pub async fn push_partial(&self) -> Result<(), StateError> {
        let segments: Vec<(ByteRange, Vec<u8>)> = {
            let mut inner = self.inner.lock().await;
            let ranges = inner.dirty.take();
            ranges
                .into_iter()
                .map(|r| {
                    let bytes = inner.buffer[r.offset as usize..r.end() as usize].to_vec();
                    (r, bytes)
                })
                .collect()
        };

        if segments.is_empty() {
            return Ok(());
        }

        for (i, (range, bytes)) in segments.iter().enumerate() {
            if let Err(e) = self
                .store
                .write_range(&self.scope, &self.key, range.offset, bytes)
                .await
            {
                // Restore everything not yet transferred
                let remaining: Vec<ByteRange> =
                    segments[i..].iter().map(|(r, _)| *r).collect();
                self.inner.lock().await.dirty.merge_from(&remaining);
                return Err(e);
            }
        }

        debug!(
            scope = %self.scope,
            key = %self.key,
            segments = segments.len(),
            "Pushed partial state value"
        );
        Ok(())
    }

    /// Acquire the guest-visible shared lock for this key.
    pub async fn read_lock(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.guest_lock).read_owned().await
    }

    /// Acquire the guest-visible exclusive lock for this key.
    pub async fn write_lock(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.guest_lock).write_owned().await
    }

    fn check_range(&self, offset: u64, length: u64) -> Result<(), StateError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(StateError::RangeOutOfBounds {
                offset,
                length,
                size: self.size,
            }),
        }
    }
}

impl std::fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateEntry")
            .field("scope", &self.scope)
            .field("key", &self.key)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
