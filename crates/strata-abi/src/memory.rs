//! Per-invocation guest memory regions.
//!
//! This module provides [`FunctionMemory`], the fixed-layout contract a
//! running function sees: an input region, an output region, and the two
//! index-aligned chain tables (names and inputs).
//!
//! Each concurrent invocation owns its own `FunctionMemory`; nothing here is
//! shared between executions, so none of these operations take locks.

use tracing::warn;

use strata_common::AbiError;

use crate::{MAX_CHAINS, MAX_INPUT_BYTES, MAX_NAME_LENGTH, MAX_OUTPUT_BYTES};

/// One entry of the chain tables: a target function name and the input
/// bytes captured for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRequest {
    /// Name of the function to chain, at most [`MAX_NAME_LENGTH`] bytes.
    pub name: String,

    /// Input bytes for the chained call, at most [`MAX_INPUT_BYTES`].
    pub input: Vec<u8>,
}

/// The memory regions owned by a single function execution.
///
/// Region semantics:
/// - Input: read-only to the function, set once at construction
/// - Output: write-only, fully overwritten by [`set_output`](Self::set_output)
/// - Chain tables: append-only within one execution, bounded at
///   [`MAX_CHAINS`] entries
///
/// # Fail-soft chaining
///
/// Requesting a chain past the table capacity is a logged no-op: the extra
/// request is dropped with no error and no partial write. Deployed functions
/// rely on this exact behavior, so it is preserved here rather than mapped
/// to an error.
#[derive(Debug)]
pub struct FunctionMemory {
    input: Vec<u8>,
    output: Vec<u8>,
    chains: Vec<ChainRequest>,
}

impl FunctionMemory {
    /// Create the memory regions for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::InputTooLarge`] if the input exceeds the input
    /// region capacity.
    pub fn new(input: Vec<u8>) -> Result<Self, AbiError> {
        if input.len() > MAX_INPUT_BYTES {
            return Err(AbiError::InputTooLarge {
                length: input.len(),
                max: MAX_INPUT_BYTES,
            });
        }

        Ok(Self {
            input,
            output: Vec::new(),
            chains: Vec::with_capacity(4),
        })
    }

    /// Read-only view of the input region.
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Overwrite the output region from offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`AbiError::OutputTooLarge`] if the data exceeds the output
    /// region capacity. Unlike the chain tables this overflow is an error,
    /// not a drop: losing output silently would corrupt the call's result.
    pub fn set_output(&mut self, data: &[u8]) -> Result<(), AbiError> {
        if data.len() > MAX_OUTPUT_BYTES {
            return Err(AbiError::OutputTooLarge {
                length: data.len(),
                max: MAX_OUTPUT_BYTES,
            });
        }

        self.output.clear();
        self.output.extend_from_slice(data);
        Ok(())
    }

    /// The current contents of the output region.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Append one entry to the chain tables.
    ///
    /// On a full table the request is logged and dropped: no error, no
    /// partial write. Over-long names and over-long inputs get the same
    /// fail-soft treatment, since with fixed-width slots either would
    /// otherwise spill into the adjacent entry.
    pub fn chain_function(&mut self, name: &str, input: &[u8]) {
        if self.chains.len() >= MAX_CHAINS {
            warn!(name = %name, max_chains = MAX_CHAINS, "Reached max chains, dropping request");
            return;
        }

        if name.len() > MAX_NAME_LENGTH {
            warn!(
                name_length = name.len(),
                max = MAX_NAME_LENGTH,
                "Chain name exceeds slot width, dropping request"
            );
            return;
        }

        if input.len() > MAX_INPUT_BYTES {
            warn!(
                input_length = input.len(),
                max = MAX_INPUT_BYTES,
                "Chain input exceeds slot width, dropping request"
            );
            return;
        }

        self.chains.push(ChainRequest {
            name: name.to_string(),
            input: input.to_vec(),
        });
    }

    /// The chain requests recorded so far, in request order.
    pub fn chained(&self) -> &[ChainRequest] {
        &self.chains
    }

    /// Number of chain requests recorded so far.
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Drain the chain tables.
    ///
    /// The host calls this once after the function returns, to dispatch the
    /// recorded requests.
    pub fn take_chained(&mut self) -> Vec<ChainRequest> {
        std::mem::take(&mut self.chains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_round_trip() {
        let memory = FunctionMemory::new(vec![6, 7]).unwrap();
        assert_eq!(memory.input(), &[6, 7]);
    }

    #[test]
    fn test_input_too_large() {
        let result = FunctionMemory::new(vec![0; MAX_INPUT_BYTES + 1]);
        assert!(matches!(result, Err(AbiError::InputTooLarge { .. })));
    }

    #[test]
    fn test_input_at_capacity() {
        let memory = FunctionMemory::new(vec![0; MAX_INPUT_BYTES]).unwrap();
        assert_eq!(memory.input().len(), MAX_INPUT_BYTES);
    }

    #[test]
    fn test_set_output_overwrites() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();

        memory.set_output(&[1, 2, 3, 4]).unwrap();
        assert_eq!(memory.output(), &[1, 2, 3, 4]);

        // Full overwrite from offset 0, not an append
        memory.set_output(&[9]).unwrap();
        assert_eq!(memory.output(), &[9]);
    }

    #[test]
    fn test_set_output_too_large() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();
        let result = memory.set_output(&vec![0; MAX_OUTPUT_BYTES + 1]);

        assert!(matches!(result, Err(AbiError::OutputTooLarge { .. })));
        assert!(memory.output().is_empty());
    }

    #[test]
    fn test_chain_function_appends_in_order() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();

        memory.chain_function("alpha", &[1]);
        memory.chain_function("beta", &[2, 3]);

        assert_eq!(memory.chain_count(), 2);
        assert_eq!(memory.chained()[0].name, "alpha");
        assert_eq!(memory.chained()[0].input, vec![1]);
        assert_eq!(memory.chained()[1].name, "beta");
        assert_eq!(memory.chained()[1].input, vec![2, 3]);
    }

    #[test]
    fn test_chain_overflow_drops_silently() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();

        // One more request than the table holds
        for i in 0..=MAX_CHAINS {
            memory.chain_function(&format!("fn-{i}"), &[i as u8]);
        }

        // Exactly MAX_CHAINS entries, the rest dropped without error
        assert_eq!(memory.chain_count(), MAX_CHAINS);
        assert_eq!(memory.chained()[MAX_CHAINS - 1].name, "fn-19");
    }

    #[test]
    fn test_chain_name_too_long_dropped() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();

        let long_name = "x".repeat(MAX_NAME_LENGTH + 1);
        memory.chain_function(&long_name, &[1]);

        assert_eq!(memory.chain_count(), 0);
    }

    #[test]
    fn test_take_chained_drains() {
        let mut memory = FunctionMemory::new(Vec::new()).unwrap();
        memory.chain_function("alpha", &[1]);

        let chained = memory.take_chained();
        assert_eq!(chained.len(), 1);
        assert_eq!(memory.chain_count(), 0);
    }
}
