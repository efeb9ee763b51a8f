//! Execution engine seam and the local in-process implementation.
//!
//! The sandboxed execution engine is an external collaborator: given an
//! invocation identity and input bytes it produces output bytes and a
//! success result. This module defines that seam ([`ExecutionEngine`]) plus
//! [`LocalEngine`], a deterministic single-process implementation that runs
//! registered guest functions directly. It mirrors, at single-process
//! granularity, the distributed semantics where a chain dispatches a new
//! invocation elsewhere in a cluster.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument, warn};

use strata_abi::FunctionMemory;
use strata_common::WorkerError;

use crate::host::HostContext;

/// Result of one function execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Did the function report success?
    pub success: bool,

    /// Bytes the function wrote to its output region.
    pub output: Vec<u8>,
}

impl ExecutionOutcome {
    /// An outcome with no output.
    pub fn failed() -> Self {
        Self {
            success: false,
            output: Vec::new(),
        }
    }
}

/// The sandboxed execution engine collaborator.
///
/// Invoked once per call unit by the dispatch loop and once per chained
/// invocation by the concurrency model. Implementations must be safe to
/// invoke concurrently; each call receives its own [`HostContext`].
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Execute the function identified by the context inside `host`.
    async fn invoke(&self, host: HostContext) -> Result<ExecutionOutcome, WorkerError>;
}

/// A guest function runnable by the [`LocalEngine`].
///
/// The function sees its fixed ABI regions through [`FunctionMemory`] and
/// reaches host services (state, chaining) through the [`HostContext`].
/// Returns its success status.
#[async_trait]
pub trait GuestFunction: Send + Sync {
    /// Run the function body.
    async fn exec(&self, memory: &mut FunctionMemory, host: &HostContext) -> bool;
}

/// In-process execution engine over a registry of guest functions.
///
/// Functions are addressed by index for direct invocation and chaining, and
/// by name for requests recorded in the ABI chain tables.
#[derive(Default)]
pub struct LocalEngine {
    functions: DashMap<u32, Arc<dyn GuestFunction>>,
    names: DashMap<String, u32>,
}

impl LocalEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under an index and a name.
    pub fn register(
        &self,
        index: u32,
        name: impl Into<String>,
        function: Arc<dyn GuestFunction>,
    ) {
        self.functions.insert(index, function);
        self.names.insert(name.into(), index);
    }

    /// Resolve a chain-table name to a function index.
    pub fn resolve_name(&self, name: &str) -> Option<u32> {
        self.names.get(name).map(|i| *i)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[async_trait]
impl ExecutionEngine for LocalEngine {
    #[instrument(skip(self, host), fields(function = host.current_function(), scope = %host.scope()))]
    async fn invoke(&self, host: HostContext) -> Result<ExecutionOutcome, WorkerError> {
        let index = host.current_function();
        let function = self
            .functions
            .get(&index)
            .map(|f| f.clone())
            .ok_or_else(|| WorkerError::function_not_found(index))?;

        let mut memory = FunctionMemory::new(host.input().to_vec())?;

        debug!("Executing guest function");
        let success = function.exec(&mut memory, &host).await;

        // Dispatch named chain requests recorded during the execution.
        // Fire-and-forget: the requesting function already returned, so
        // nobody is left to await these.
        for request in memory.take_chained() {
            match self.resolve_name(&request.name) {
                Some(target) => {
                    let call_id = host.chain_this(target, &request.input);
                    debug!(name = %request.name, target, call_id, "Dispatched named chain");
                }
                None => {
                    warn!(name = %request.name, "Named chain target not registered, dropping");
                }
            }
        }

        Ok(ExecutionOutcome {
            success,
            output: memory.output().to_vec(),
        })
    }
}

impl std::fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEngine")
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}
