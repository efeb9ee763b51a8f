//! Distributed state cache for strata-runtime.
//!
//! This crate gives sandboxed functions shared, partially-synchronized
//! access to byte-addressable values backed by a remote key-value store:
//!
//! - [`DirtySet`] tracks which byte ranges of a cached value run ahead of
//!   the remote copy
//! - [`StateEntry`] is one cached value with pull/push synchronization
//! - [`StateCache`] is the process-scoped registry of entries
//! - [`BackingStore`] is the seam to the remote store, with [`MemoryStore`]
//!   as the in-process reference implementation
//!
//! Splitting full and partial push lets multi-megabyte values synchronize
//! with network cost proportional to the bytes actually changed.

pub mod cache;
pub mod dirty;
pub mod entry;
pub mod store;

pub use cache::{ScopedKey, StateCache};
pub use dirty::{ByteRange, DirtySet};
pub use entry::StateEntry;
pub use store::{BackingStore, MemoryStore};
