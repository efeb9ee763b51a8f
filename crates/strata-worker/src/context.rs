//! Per-invocation execution identity.
//!
//! Every function execution, root or chained, carries its own immutable
//! [`InvocationContext`]: the owner scope, the function index, and the input
//! bytes captured for it. The context is passed explicitly into the task
//! that runs the invocation, never read from ambient global state, so
//! concurrent chained invocations can never observe each other's identity.

/// The immutable identity of one function execution.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    scope: String,
    function: u32,
    input: Vec<u8>,
}

impl InvocationContext {
    /// Create a context for one execution.
    ///
    /// The input is captured by value: later mutation of the caller's
    /// buffer cannot affect this invocation.
    pub fn new(scope: impl Into<String>, function: u32, input: Vec<u8>) -> Self {
        Self {
            scope: scope.into(),
            function,
            input,
        }
    }

    /// Owner scope under which state keys resolve.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Index of the function being executed.
    ///
    /// A chained invocation's own ABI calls resolve relative to this, not
    /// to the identity of whoever chained it.
    pub fn function(&self) -> u32 {
        self.function
    }

    /// Input bytes for this execution.
    pub fn input(&self) -> &[u8] {
        &self.input
    }
}
