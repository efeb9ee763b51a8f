//! Call-identity management for chained invocations.
//!
//! This module provides [`ChainSet`], the per-worker registry of in-flight
//! chained calls. Identifiers are assigned in strictly increasing order and
//! never reused for the lifetime of the owning worker, so a function can
//! unambiguously await any of several chains it started.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::error;

use strata_common::ChainError;

/// Identifier of one chained invocation, unique per worker.
pub type CallId = u64;

/// One in-flight (or completed) chained call.
///
/// The task handle is consumed by the first successful await; the record
/// itself stays behind so a second await fails with `NotJoinable` rather
/// than `UnknownCall`.
struct ChainRecord {
    /// Index of the chained function.
    function: u32,

    /// Join handle for the concurrent task, `None` once awaited.
    handle: Option<JoinHandle<bool>>,
}

/// Per-worker registry of chained calls.
#[derive(Default)]
pub struct ChainSet {
    next_id: AtomicU64,
    records: DashMap<CallId, ChainRecord>,
}

impl ChainSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next call identifier. Strictly increasing, never
    /// reused.
    pub fn allocate(&self) -> CallId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a spawned chained call under its identifier.
    pub fn register(&self, call_id: CallId, function: u32, handle: JoinHandle<bool>) {
        self.records.insert(
            call_id,
            ChainRecord {
                function,
                handle: Some(handle),
            },
        );
    }

    /// Block until the identified invocation completes and return its
    /// completion status.
    ///
    /// # Errors
    ///
    /// - [`ChainError::UnknownCall`] if the identifier was never issued
    /// - [`ChainError::NotJoinable`] if the call was already awaited
    /// - [`ChainError::Join`] if the task could not be joined (panicked)
    pub async fn await_call(&self, call_id: CallId) -> Result<bool, ChainError> {
        let handle = {
            let mut record = self
                .records
                .get_mut(&call_id)
                .ok_or(ChainError::UnknownCall { call_id })?;
            record
                .handle
                .take()
                .ok_or(ChainError::NotJoinable { call_id })?
            // guard dropped here, before the join suspends
        };

        handle.await.map_err(|e| {
            error!(call_id, error = %e, "Chained task failed to join");
            ChainError::Join {
                call_id,
                reason: e.to_string(),
            }
        })
    }

    /// Target function index recorded for a call, if the identifier was
    /// issued.
    pub fn function_of(&self, call_id: CallId) -> Option<u32> {
        self.records.get(&call_id).map(|r| r.function)
    }

    /// Number of calls whose task has not been awaited yet.
    pub fn in_flight(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.handle.is_some())
            .count()
    }
}

impl std::fmt::Debug for ChainSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSet")
            .field("records", &self.records.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
