//! Configuration file structures for strata-runtime.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`QueueConfig`]: Work queue settings
//! - [`StoreConfig`]: Backing store settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// This structure represents a complete TOML configuration file
/// that can be loaded at startup.
///
/// # Example
///
/// ```toml
/// [runtime.state]
/// default_scope = "emulated"
/// max_state_bytes = 65536
///
/// [runtime.worker]
/// full_async = false
/// max_iterations = 50
///
/// [queue]
/// capacity = 64
///
/// [store]
/// kind = "memory"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (state + worker settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Work queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Backing store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// Work queue configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Buffered capacity of the in-process call queue.
    #[serde(default = "defaults::queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::queue_capacity(),
        }
    }
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Store backend to use.
    ///
    /// Only `"memory"` is built in; a networked backend plugs in through
    /// the `BackingStore` trait.
    #[serde(default = "defaults::store_kind")]
    pub kind: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: defaults::store_kind(),
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

/// Default value functions for serde.
mod defaults {
    pub const fn queue_capacity() -> usize {
        64
    }

    pub fn store_kind() -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.queue.capacity, 64);
        assert_eq!(config.store.kind, "memory");
        assert_eq!(config.runtime.state.default_scope, "emulated");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [queue]
            capacity = 8
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.queue.capacity, 8);
        // Defaults applied
        assert_eq!(config.store.kind, "memory");
        assert_eq!(config.runtime.state.max_state_bytes, 65536);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.state]
            default_scope = "tenant-a"
            max_state_bytes = 32768

            [runtime.worker]
            full_async = true
            max_iterations = 50

            [queue]
            capacity = 128

            [store]
            kind = "memory"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(config.runtime.state.default_scope, "tenant-a");
        assert_eq!(config.runtime.state.max_state_bytes, 32768);
        assert!(config.runtime.worker.full_async);
        assert_eq!(config.runtime.worker.max_iterations, Some(50));
        assert_eq!(config.queue.capacity, 128);
        assert_eq!(config.store.kind, "memory");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let invalid = "this is not valid toml [";
        let result = ConfigFile::from_toml(invalid);
        assert!(result.is_err());
    }
}
