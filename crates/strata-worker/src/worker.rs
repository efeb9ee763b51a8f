//! The call dispatch loop.
//!
//! A [`Worker`] drives call units end-to-end: fetch from the shared queue,
//! execute through the engine, report the outcome, repeat. The loop's only
//! idle blocking point is the queue fetch; an execution failure becomes a
//! failed outcome, never a crash of the worker.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use strata_common::WorkerError;

use crate::host::Invoker;
use crate::queue::{CallOutcome, CallQueue};

/// One worker's dispatch loop over a shared call queue.
pub struct Worker {
    queue: Arc<dyn CallQueue>,
    invoker: Invoker,
}

impl Worker {
    /// Create a worker over the given queue and services.
    pub fn new(queue: Arc<dyn CallQueue>, invoker: Invoker) -> Self {
        Self { queue, invoker }
    }

    /// The worker's service bundle.
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Run the dispatch loop.
    ///
    /// Loops until the queue closes or the configured iteration bound is
    /// reached, whichever comes first, and returns the number of calls
    /// processed. Per-call failures are reported as unsuccessful outcomes;
    /// only a failure to *report* aborts the loop.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<usize, WorkerError> {
        let max_iterations = self.invoker.config().max_iterations;
        let mut processed = 0usize;

        info!(?max_iterations, "Worker started");

        loop {
            if let Some(bound) = max_iterations {
                if processed >= bound {
                    info!(processed, "Iteration bound reached");
                    break;
                }
            }

            // Fetching: the only blocking point while idle
            let call = match self.queue.next_call().await {
                Ok(call) => call,
                Err(WorkerError::QueueClosed) => {
                    info!(processed, "Queue closed, worker stopping");
                    break;
                }
                Err(e) => return Err(e),
            };

            info!(
                call_id = %call.id,
                scope = %call.scope,
                function = call.function,
                "Received call"
            );

            // Executing
            let success = match self
                .invoker
                .invoke(&call.scope, call.function, call.input.clone())
                .await
            {
                Ok(outcome) => outcome.success,
                Err(e) => {
                    error!(call_id = %call.id, error = %e, "Execution failed");
                    false
                }
            };

            if !success {
                warn!(call_id = %call.id, "Call completed unsuccessfully");
            }

            // Reporting
            self.queue
                .report(CallOutcome {
                    id: call.id,
                    scope: call.scope,
                    function: call.function,
                    success,
                })
                .await?;

            processed += 1;
        }

        Ok(processed)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use strata_abi::FunctionMemory;
    use strata_common::{StateConfig, WorkerConfig};
    use strata_state::{BackingStore, MemoryStore, StateCache};

    use crate::chain::ChainSet;
    use crate::engine::{GuestFunction, LocalEngine};
    use crate::host::HostContext;
    use crate::queue::{CallUnit, MemoryQueue};

    struct AlwaysSucceeds;

    #[async_trait]
    impl GuestFunction for AlwaysSucceeds {
        async fn exec(&self, _memory: &mut FunctionMemory, _host: &HostContext) -> bool {
            true
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl GuestFunction for AlwaysFails {
        async fn exec(&self, _memory: &mut FunctionMemory, _host: &HostContext) -> bool {
            false
        }
    }

    fn test_worker(queue: Arc<MemoryQueue>) -> Worker {
        let engine = Arc::new(LocalEngine::new());
        engine.register(1, "ok", Arc::new(AlwaysSucceeds));
        engine.register(2, "fail", Arc::new(AlwaysFails));

        let store = Arc::new(MemoryStore::new()) as Arc<dyn BackingStore>;
        let state = Arc::new(StateCache::new(store, &StateConfig::default()));
        let invoker = Invoker::new(
            engine,
            Arc::new(ChainSet::new()),
            state,
            WorkerConfig::default(),
        );

        Worker::new(queue, invoker)
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let (queue, producer) = MemoryQueue::new(8);
        let queue = Arc::new(queue);

        let ok = producer
            .submit(CallUnit::new("user", 1, Vec::new()))
            .await
            .unwrap();
        let fail = producer
            .submit(CallUnit::new("user", 2, Vec::new()))
            .await
            .unwrap();
        drop(producer);

        let worker = test_worker(Arc::clone(&queue));
        let processed = worker.run().await.unwrap();

        assert_eq!(processed, 2);
        assert!(queue.outcome(&ok).unwrap().success);
        assert!(!queue.outcome(&fail).unwrap().success);
    }

    #[tokio::test]
    async fn test_unknown_function_reported_not_fatal() {
        let (queue, producer) = MemoryQueue::new(8);
        let queue = Arc::new(queue);

        let bad = producer
            .submit(CallUnit::new("user", 99, Vec::new()))
            .await
            .unwrap();
        let good = producer
            .submit(CallUnit::new("user", 1, Vec::new()))
            .await
            .unwrap();
        drop(producer);

        let worker = test_worker(Arc::clone(&queue));
        let processed = worker.run().await.unwrap();

        // The failed call did not stop the loop
        assert_eq!(processed, 2);
        assert!(!queue.outcome(&bad).unwrap().success);
        assert!(queue.outcome(&good).unwrap().success);
    }

    #[tokio::test]
    async fn test_iteration_bound() {
        let (queue, producer) = MemoryQueue::new(8);
        let queue = Arc::new(queue);

        for _ in 0..5 {
            producer
                .submit(CallUnit::new("user", 1, Vec::new()))
                .await
                .unwrap();
        }

        let engine = Arc::new(LocalEngine::new());
        engine.register(1, "ok", Arc::new(AlwaysSucceeds));
        let store = Arc::new(MemoryStore::new()) as Arc<dyn BackingStore>;
        let state = Arc::new(StateCache::new(store, &StateConfig::default()));
        let invoker = Invoker::new(
            engine,
            Arc::new(ChainSet::new()),
            state,
            WorkerConfig {
                max_iterations: Some(3),
                ..Default::default()
            },
        );

        let worker = Worker::new(Arc::clone(&queue) as Arc<dyn CallQueue>, invoker);
        let processed = worker.run().await.unwrap();

        assert_eq!(processed, 3);
        assert_eq!(queue.reported(), 3);
    }
}
