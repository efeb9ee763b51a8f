//! Host services for running functions.
//!
//! This module provides:
//! - [`Invoker`]: the shared bundle of services a worker offers its
//!   invocations (execution engine, chain registry, state cache, config)
//! - [`HostContext`]: the surface one running function sees, combining the
//!   shared services with that invocation's own immutable identity
//!
//! Every host call that touches state resolves keys under the invocation's
//! own scope, and every chain starts a concurrent task with its own
//! independent context.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tracing::{debug, error};

use strata_common::{ChainError, StateError, WorkerConfig};
use strata_state::StateCache;

use crate::chain::{CallId, ChainSet};
use crate::context::InvocationContext;
use crate::engine::{ExecutionEngine, ExecutionOutcome};

/// Shared services of one worker.
///
/// Cheap to clone; every clone shares the same engine, chain registry, and
/// state cache.
#[derive(Clone)]
pub struct Invoker {
    engine: Arc<dyn ExecutionEngine>,
    chains: Arc<ChainSet>,
    state: Arc<StateCache>,
    config: WorkerConfig,
}

impl Invoker {
    /// Create the service bundle for a worker.
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        chains: Arc<ChainSet>,
        state: Arc<StateCache>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            engine,
            chains,
            state,
            config,
        }
    }

    /// The worker's chain registry.
    pub fn chains(&self) -> &Arc<ChainSet> {
        &self.chains
    }

    /// The worker's state cache.
    pub fn state(&self) -> &Arc<StateCache> {
        &self.state
    }

    /// The worker configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Execute a function to completion with its own fresh context.
    pub async fn invoke(
        &self,
        scope: &str,
        function: u32,
        input: Vec<u8>,
    ) -> Result<ExecutionOutcome, strata_common::WorkerError> {
        let host = HostContext::new(
            self.clone(),
            InvocationContext::new(scope, function, input),
        );
        self.engine.invoke(host).await
    }

    /// Start a concurrent invocation of `function` and return its call
    /// identifier immediately.
    ///
    /// The input is captured by value and becomes the chained invocation's
    /// own input region; the spawned task carries a fresh
    /// [`InvocationContext`] so further chaining and state access resolve
    /// against the chained function's identity.
    pub fn chain_this(&self, scope: &str, function: u32, input: &[u8]) -> CallId {
        let call_id = self.chains.allocate();

        let host = HostContext::new(
            self.clone(),
            InvocationContext::new(scope, function, input.to_vec()),
        );
        let engine = Arc::clone(&self.engine);

        let handle = tokio::spawn(async move {
            match engine.invoke(host).await {
                Ok(outcome) => outcome.success,
                Err(e) => {
                    error!(error = %e, "Chained invocation failed");
                    false
                }
            }
        });

        self.chains.register(call_id, function, handle);
        debug!(function, call_id, "Chained local function");
        call_id
    }

    /// Block until the identified chained invocation completes.
    pub async fn await_call(&self, call_id: CallId) -> Result<bool, ChainError> {
        self.chains.await_call(call_id).await
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("chains", &self.chains)
            .finish_non_exhaustive()
    }
}

/// The host interface one running function sees.
///
/// Wraps the invocation's immutable identity together with the worker's
/// shared services. State keys resolve under the invocation's scope; sync
/// modes honor the worker-wide `full_async`/`full_sync` overrides.
pub struct HostContext {
    invoker: Invoker,
    ctx: InvocationContext,
}

impl HostContext {
    /// Bind an invocation identity to the worker's services.
    pub fn new(invoker: Invoker, ctx: InvocationContext) -> Self {
        Self { invoker, ctx }
    }

    /// Input bytes of the current invocation.
    pub fn input(&self) -> &[u8] {
        self.ctx.input()
    }

    /// Function index of the currently executing (possibly chained)
    /// invocation.
    pub fn current_function(&self) -> u32 {
        self.ctx.function()
    }

    /// Owner scope of the current invocation.
    pub fn scope(&self) -> &str {
        self.ctx.scope()
    }

    /// Ensure a state key exists and return its total size.
    pub async fn init_state(&self, key: &str, source: Option<&str>) -> Result<u64, StateError> {
        self.invoker.state.init_state(self.scope(), key, source).await
    }

    /// Pull and read the full value at `key`.
    ///
    /// With `deferred`, the pull is enqueued instead of awaited and the
    /// returned bytes may be stale.
    pub async fn read_state(
        &self,
        key: &str,
        total: u64,
        deferred: bool,
    ) -> Result<Vec<u8>, StateError> {
        let entry = self.invoker.state.entry(self.scope(), key, total)?;
        if self.resolve_deferred(deferred) {
            entry.pull_deferred();
        } else {
            entry.pull().await?;
        }
        Ok(entry.get().await)
    }

    /// Pull and read a byte range of the value at `key`.
    pub async fn read_state_segment(
        &self,
        key: &str,
        total: u64,
        offset: u64,
        length: u64,
        deferred: bool,
    ) -> Result<Vec<u8>, StateError> {
        let entry = self.invoker.state.entry(self.scope(), key, total)?;
        if self.resolve_deferred(deferred) {
            entry.pull_deferred();
        } else {
            entry.pull().await?;
        }
        entry.get_segment(offset, length).await
    }

    /// Overwrite the full value at `key`, pushing to the store unless
    /// deferred.
    pub async fn write_state(
        &self,
        key: &str,
        data: &[u8],
        deferred: bool,
    ) -> Result<(), StateError> {
        let entry = self
            .invoker
            .state
            .entry(self.scope(), key, data.len() as u64)?;
        entry.set(data).await?;
        if !self.resolve_deferred(deferred) {
            entry.push_full().await?;
        }
        Ok(())
    }

    /// Overwrite a byte range of the value at `key`, pushing the dirty
    /// ranges unless deferred.
    pub async fn write_state_segment(
        &self,
        key: &str,
        total: u64,
        offset: u64,
        data: &[u8],
        deferred: bool,
    ) -> Result<(), StateError> {
        let entry = self.invoker.state.entry(self.scope(), key, total)?;
        entry.set_segment(offset, data).await?;
        if !self.resolve_deferred(deferred) {
            entry.push_partial().await?;
        }
        Ok(())
    }

    /// Mark the whole value at `key` dirty without writing it.
    pub async fn flag_state_dirty(&self, key: &str, total: u64) -> Result<(), StateError> {
        let entry = self.invoker.state.entry(self.scope(), key, total)?;
        entry.flag_dirty().await;
        Ok(())
    }

    /// Mark a range of the value at `key` dirty without writing it.
    pub async fn flag_state_segment_dirty(
        &self,
        key: &str,
        total: u64,
        offset: u64,
        length: u64,
    ) -> Result<(), StateError> {
        let entry = self.invoker.state.entry(self.scope(), key, total)?;
        entry.flag_segment_dirty(offset, length).await
    }

    /// Push the full value at `key` to the backing store.
    pub async fn push_state(&self, key: &str) -> Result<(), StateError> {
        self.invoker
            .state
            .existing(self.scope(), key)?
            .push_full()
            .await
    }

    /// Push only the dirty ranges of the value at `key`.
    pub async fn push_state_partial(&self, key: &str) -> Result<(), StateError> {
        self.invoker
            .state
            .existing(self.scope(), key)?
            .push_partial()
            .await
    }

    /// Acquire the shared per-key lock for `key`.
    pub async fn lock_state_read(&self, key: &str) -> Result<OwnedRwLockReadGuard<()>, StateError> {
        Ok(self.invoker.state.existing(self.scope(), key)?.read_lock().await)
    }

    /// Acquire the exclusive per-key lock for `key`.
    ///
    /// Hold the guard for the whole read-modify-write sequence.
    pub async fn lock_state_write(
        &self,
        key: &str,
    ) -> Result<OwnedRwLockWriteGuard<()>, StateError> {
        Ok(self.invoker.state.existing(self.scope(), key)?.write_lock().await)
    }

    /// Start a chained invocation under this invocation's scope.
    pub fn chain_this(&self, function: u32, input: &[u8]) -> CallId {
        self.invoker.chain_this(self.scope(), function, input)
    }

    /// Block until a chained invocation completes.
    pub async fn await_call(&self, call_id: CallId) -> Result<bool, ChainError> {
        self.invoker.await_call(call_id).await
    }

    /// Read a runtime configuration flag.
    ///
    /// Known names are `FULL_ASYNC` and `FULL_SYNC`, reported as `"1"` or
    /// `"0"`. Unknown names return `None`.
    pub fn read_config(&self, name: &str) -> Option<&'static str> {
        let flag = match name {
            "FULL_ASYNC" => self.invoker.config.full_async,
            "FULL_SYNC" => self.invoker.config.full_sync,
            _ => return None,
        };
        Some(if flag { "1" } else { "0" })
    }

    fn resolve_deferred(&self, requested: bool) -> bool {
        self.invoker.config.resolve_deferred(requested)
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("scope", &self.ctx.scope())
            .field("function", &self.ctx.function())
            .finish_non_exhaustive()
    }
}
