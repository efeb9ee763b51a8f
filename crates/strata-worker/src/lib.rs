//! Chained invocation model and call dispatch loop for strata-runtime.
//!
//! This crate drives sandboxed function executions on a worker:
//!
//! - [`InvocationContext`]: the explicit, immutable identity of one
//!   execution
//! - [`ChainSet`] and [`Invoker::chain_this`]: concurrent chained
//!   invocations with unique, awaitable call identifiers
//! - [`HostContext`]: the host surface a running function sees (state,
//!   chaining, config)
//! - [`Worker`]: the fetch/execute/report dispatch loop over a shared
//!   [`CallQueue`]
//! - [`ExecutionEngine`] and [`LocalEngine`]: the sandbox seam and its
//!   single-process implementation

pub mod chain;
pub mod context;
pub mod engine;
pub mod host;
pub mod queue;
pub mod worker;

pub use chain::{CallId, ChainSet};
pub use context::InvocationContext;
pub use engine::{ExecutionEngine, ExecutionOutcome, GuestFunction, LocalEngine};
pub use host::{HostContext, Invoker};
pub use queue::{CallOutcome, CallQueue, CallUnit, MemoryQueue, QueueProducer};
pub use worker::Worker;
