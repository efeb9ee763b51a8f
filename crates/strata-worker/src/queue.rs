//! Work queue interface and the in-memory implementation.
//!
//! The queue supplies call units (owner identity, function identity, input
//! bytes) and accepts outcome reports. A distributed deployment backs this
//! with a networked queue; [`MemoryQueue`] is the single-process stand-in
//! with the same blocking-fetch semantics.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use strata_common::WorkerError;

/// One unit of work: who owns it, which function to run, with what input.
///
/// Created by the queue producer, consumed exactly once by a worker, and
/// terminated by a reported [`CallOutcome`].
#[derive(Debug, Clone)]
pub struct CallUnit {
    /// Unique identifier of this call, for outcome correlation.
    pub id: Uuid,

    /// Owner identity; state keys resolve under this scope.
    pub scope: String,

    /// Index of the function to execute.
    pub function: u32,

    /// Input bytes for the execution.
    pub input: Vec<u8>,
}

impl CallUnit {
    /// Create a call unit with a fresh identifier.
    pub fn new(scope: impl Into<String>, function: u32, input: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope: scope.into(),
            function,
            input,
        }
    }
}

/// The reported result of one call unit.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// Identifier of the call this outcome belongs to.
    pub id: Uuid,

    /// Owner identity of the call.
    pub scope: String,

    /// Function that was executed.
    pub function: u32,

    /// Did the execution succeed? A failed call is reported here, never
    /// raised past the queue layer.
    pub success: bool,
}

/// The shared work queue collaborator.
#[async_trait]
pub trait CallQueue: Send + Sync {
    /// Fetch the next call unit, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::QueueClosed`] once the producer side is gone
    /// and the queue is drained.
    async fn next_call(&self) -> Result<CallUnit, WorkerError>;

    /// Report the outcome of a consumed call unit.
    async fn report(&self, outcome: CallOutcome) -> Result<(), WorkerError>;
}

/// In-memory work queue over a tokio channel.
///
/// Outcomes are retained in a map keyed by call id so producers (and tests)
/// can observe results.
pub struct MemoryQueue {
    receiver: Mutex<mpsc::Receiver<CallUnit>>,
    outcomes: DashMap<Uuid, CallOutcome>,
}

/// Producer handle for a [`MemoryQueue`]. Cloneable; the queue closes once
/// every producer is dropped.
#[derive(Clone)]
pub struct QueueProducer {
    sender: mpsc::Sender<CallUnit>,
}

impl MemoryQueue {
    /// Create a queue with the given buffered capacity, returning the
    /// consumer side and a producer handle.
    pub fn new(capacity: usize) -> (Self, QueueProducer) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                receiver: Mutex::new(receiver),
                outcomes: DashMap::new(),
            },
            QueueProducer { sender },
        )
    }

    /// The reported outcome for a call, if any.
    pub fn outcome(&self, id: &Uuid) -> Option<CallOutcome> {
        self.outcomes.get(id).map(|o| o.clone())
    }

    /// Number of outcomes reported so far.
    pub fn reported(&self) -> usize {
        self.outcomes.len()
    }
}

impl QueueProducer {
    /// Submit a call unit, returning its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::QueueClosed`] if the consumer side is gone.
    pub async fn submit(&self, unit: CallUnit) -> Result<Uuid, WorkerError> {
        let id = unit.id;
        self.sender
            .send(unit)
            .await
            .map_err(|_| WorkerError::QueueClosed)?;
        Ok(id)
    }
}

#[async_trait]
impl CallQueue for MemoryQueue {
    async fn next_call(&self) -> Result<CallUnit, WorkerError> {
        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(WorkerError::QueueClosed)
    }

    async fn report(&self, outcome: CallOutcome) -> Result<(), WorkerError> {
        self.outcomes.insert(outcome.id, outcome);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("reported", &self.outcomes.len())
            .finish_non_exhaustive()
    }
}
