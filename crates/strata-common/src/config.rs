//! Configuration structures for strata-runtime.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`StateConfig`]: State cache settings (default scope, size bound)
//! - [`WorkerConfig`]: Worker dispatch settings (sync mode, iteration bound)

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// This structure contains all configuration options for a worker process.
/// It can be loaded from files (TOML, JSON) or environment variables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// State cache configuration.
    #[serde(default)]
    pub state: StateConfig,

    /// Worker dispatch configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// State cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// Scope used for state keys when a call carries no owner identity.
    ///
    /// Resolving against a dummy scope keeps key handling uniform for
    /// locally emulated calls.
    #[serde(default = "defaults::default_scope")]
    pub default_scope: String,

    /// Advisory bound for single-buffer state operations, in bytes.
    #[serde(default = "defaults::max_state_bytes")]
    pub max_state_bytes: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            default_scope: defaults::default_scope(),
            max_state_bytes: defaults::max_state_bytes(),
        }
    }
}

/// Worker dispatch configuration.
///
/// The `full_async` and `full_sync` flags are exposed to running functions
/// through the host `read_config` call and let a deployment force all state
/// transfers into deferred or blocking mode respectively.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Treat every state push/pull as deferred, regardless of the flag the
    /// caller passed.
    #[serde(default)]
    pub full_async: bool,

    /// Treat every state push/pull as blocking, regardless of the flag the
    /// caller passed. Takes precedence over `full_async`.
    #[serde(default)]
    pub full_sync: bool,

    /// Bound on dispatch loop iterations.
    ///
    /// `None` loops indefinitely; test configurations set a bound so the
    /// worker drains a fixed number of calls and returns.
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            full_async: false,
            full_sync: false,
            max_iterations: None,
        }
    }
}

impl WorkerConfig {
    /// Resolve a caller-supplied "deferred" flag against the global
    /// sync-mode overrides.
    pub fn resolve_deferred(&self, requested: bool) -> bool {
        if self.full_sync {
            false
        } else if self.full_async {
            true
        } else {
            requested
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub fn default_scope() -> String {
        "emulated".to_string()
    }

    pub const fn max_state_bytes() -> usize {
        65536
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();

        assert_eq!(config.state.default_scope, "emulated");
        assert_eq!(config.state.max_state_bytes, 65536);

        assert!(!config.worker.full_async);
        assert!(!config.worker.full_sync);
        assert!(config.worker.max_iterations.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = RuntimeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.state.default_scope, deserialized.state.default_scope);
        assert_eq!(
            config.state.max_state_bytes,
            deserialized.state.max_state_bytes
        );
    }

    #[test]
    fn test_resolve_deferred() {
        let config = WorkerConfig::default();
        assert!(config.resolve_deferred(true));
        assert!(!config.resolve_deferred(false));

        let config = WorkerConfig {
            full_async: true,
            ..Default::default()
        };
        assert!(config.resolve_deferred(false));

        // full_sync wins over full_async
        let config = WorkerConfig {
            full_async: true,
            full_sync: true,
            ..Default::default()
        };
        assert!(!config.resolve_deferred(true));
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"state": {"default_scope": "tenant-a"}}"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert_eq!(config.state.default_scope, "tenant-a");
        // Default values for unspecified fields
        assert_eq!(config.state.max_state_bytes, 65536);
        assert!(!config.worker.full_async);
    }
}
