//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults;

/// Main configuration for Gantry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GantryConfig {
    /// Backend configuration
    pub backend: BackendConfig,

    /// Build behavior configuration
    pub build: BuildConfig,
}

/// How to reach the external build backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend executable name, resolved on PATH when not absolute
    pub executable: String,

    /// Explicit path overriding PATH lookup
    pub executable_path: Option<PathBuf>,

    /// Arguments passed to every invocation before the task list
    pub default_arguments: Vec<String>,

    /// JVM arguments forwarded to the backend daemon
    pub jvm_arguments: Vec<String>,

    /// Flag that asks the backend to print an artifact manifest as its
    /// last line of output
    pub query_outputs_flag: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: defaults::DEFAULT_BACKEND_EXECUTABLE.to_string(),
            executable_path: None,
            default_arguments: Vec::new(),
            jvm_arguments: Vec::new(),
            query_outputs_flag: defaults::DEFAULT_QUERY_OUTPUTS_FLAG.to_string(),
        }
    }
}

/// Build behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Interval, in milliseconds, between compiler-lock acquisition
    /// attempts; each attempt re-checks for cancellation
    pub lock_poll_interval_ms: u64,

    /// Ask the backend to build project modules in parallel
    pub parallel: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            lock_poll_interval_ms: defaults::DEFAULT_LOCK_POLL_INTERVAL_MS,
            parallel: true,
        }
    }
}
