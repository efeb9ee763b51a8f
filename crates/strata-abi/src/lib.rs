//! Guest ABI contract for strata-runtime.
//!
//! This crate defines the fixed memory contract through which a sandboxed
//! function reads its input, writes its output, and requests chained
//! invocations of other functions:
//! - [`FunctionMemory`]: the per-invocation memory regions
//! - [`ChainRequest`]: one entry of the chain tables
//! - The guest-visible capacity limits, preserved bit-for-bit for
//!   compatibility with deployed functions

pub mod memory;

pub use memory::{ChainRequest, FunctionMemory};

/// Maximum number of chained calls one execution may request.
pub const MAX_CHAINS: usize = 20;

/// Fixed width of one slot in the chain-name table, in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

/// Capacity of the input region (and of each chain-input slot), in bytes.
pub const MAX_INPUT_BYTES: usize = 65536;

/// Capacity of the output region, in bytes.
pub const MAX_OUTPUT_BYTES: usize = 65536;

/// Advisory bound for single-buffer state operations, in bytes.
pub const MAX_STATE_BYTES: usize = 65536;
