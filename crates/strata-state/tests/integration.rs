//! Integration tests for strata-state.
//!
//! These tests exercise the full synchronization path: cache registry,
//! entry pull/push, and the in-memory backing store together.

use std::sync::Arc;

use strata_common::{StateConfig, StateError};
use strata_state::{BackingStore, ByteRange, MemoryStore, StateCache};

fn new_cache() -> (StateCache, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let cache = StateCache::new(
        Arc::clone(&store) as Arc<dyn BackingStore>,
        &StateConfig::default(),
    );
    (cache, store)
}

#[tokio::test]
async fn test_full_round_trip() {
    let (cache, store) = new_cache();
    let data = vec![10, 20, 30, 40, 50];

    // Writer: set + pushFull
    let writer = cache.entry("user", "blob", data.len() as u64).unwrap();
    writer.set(&data).await.unwrap();
    writer.push_full().await.unwrap();

    // Reader: a fresh cache over the same store
    let reader_cache = StateCache::new(
        Arc::clone(&store) as Arc<dyn BackingStore>,
        &StateConfig::default(),
    );
    let size = reader_cache.init_state("user", "blob", None).await.unwrap();
    assert_eq!(size, data.len() as u64);

    let reader = reader_cache.existing("user", "blob").unwrap();
    reader.pull().await.unwrap();
    assert_eq!(reader.get().await, data);
}

#[tokio::test]
async fn test_partial_sync_between_workers() {
    let (cache, store) = new_cache();
    store.seed("user", "shared", vec![0; 16]);

    // Two entries over the same remote value, touching disjoint slices
    let a = cache.entry("user", "shared", 16).unwrap();
    a.pull().await.unwrap();
    a.set_segment(0, &[1, 1]).await.unwrap();
    a.push_partial().await.unwrap();

    let other_cache = StateCache::new(
        Arc::clone(&store) as Arc<dyn BackingStore>,
        &StateConfig::default(),
    );
    let b = other_cache.entry("user", "shared", 16).unwrap();
    b.pull().await.unwrap();
    b.set_segment(14, &[2, 2]).await.unwrap();
    b.push_partial().await.unwrap();

    let mut expected = vec![0; 16];
    expected[0] = 1;
    expected[1] = 1;
    expected[14] = 2;
    expected[15] = 2;
    assert_eq!(store.value("user", "shared").unwrap(), expected);
}

#[tokio::test]
async fn test_push_partial_transfers_union_and_clears() {
    let (cache, store) = new_cache();
    store.seed("user", "v", vec![0; 10]);

    let entry = cache.entry("user", "v", 10).unwrap();
    entry.pull().await.unwrap();

    // Overlapping writes collapse to their union
    entry.set_segment(0, &[1, 1, 1]).await.unwrap();
    entry.set_segment(2, &[2, 2]).await.unwrap();
    entry.flag_segment_dirty(8, 2).await.unwrap();

    assert_eq!(
        entry.dirty_ranges().await,
        vec![ByteRange::new(0, 4), ByteRange::new(8, 2)]
    );

    entry.push_partial().await.unwrap();
    assert!(entry.dirty_ranges().await.is_empty());
    assert_eq!(
        store.value("user", "v").unwrap(),
        vec![1, 1, 2, 2, 0, 0, 0, 0, 0, 0]
    );
}

#[tokio::test]
async fn test_concurrent_writers_same_entry() {
    let (cache, store) = new_cache();
    store.seed("user", "v", vec![0; 64]);

    let entry = cache.entry("user", "v", 64).unwrap();
    entry.pull().await.unwrap();

    // Many tasks writing disjoint segments of the shared entry
    let mut handles = Vec::new();
    for i in 0..8u8 {
        let entry = Arc::clone(&entry);
        handles.push(tokio::spawn(async move {
            let offset = u64::from(i) * 8;
            entry.set_segment(offset, &[i + 1; 8]).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    entry.push_partial().await.unwrap();

    let value = store.value("user", "v").unwrap();
    for i in 0..8usize {
        assert_eq!(&value[i * 8..(i + 1) * 8], &[i as u8 + 1; 8]);
    }
}

#[tokio::test]
async fn test_store_outage_is_recoverable() {
    let (cache, store) = new_cache();
    store.seed("user", "v", vec![0; 4]);

    let entry = cache.entry("user", "v", 4).unwrap();
    entry.set(&[1, 2, 3, 4]).await.unwrap();

    store.set_unavailable(true);
    let err = entry.push_full().await.unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(entry.dirty_ranges().await, vec![ByteRange::new(0, 4)]);

    // Caller retries once the store is back
    store.set_unavailable(false);
    entry.push_full().await.unwrap();
    assert_eq!(store.value("user", "v").unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_uninitialized_key_is_an_error() {
    let (cache, _store) = new_cache();

    let err = cache.existing("user", "never-seen").unwrap_err();
    assert!(matches!(err, StateError::KeyNotInitialized { .. }));
}

#[tokio::test]
async fn test_deferred_pull_eventually_lands() {
    let (cache, store) = new_cache();
    store.seed("user", "v", vec![7; 4]);

    let entry = cache.entry("user", "v", 4).unwrap();
    entry.pull_deferred();

    // Deferred pull must not block; poll until the transfer lands
    for _ in 0..100 {
        if entry.is_fresh().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(entry.is_fresh().await);
    assert_eq!(entry.get().await, vec![7; 4]);
}
