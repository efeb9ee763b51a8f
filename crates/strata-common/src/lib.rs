//! Common types, errors, and utilities for strata-runtime.
//!
//! This crate provides shared functionality used across the strata-runtime workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for runtime settings
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{RuntimeConfig, StateConfig, WorkerConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{AbiError, ChainError, StateError, WorkerError};
