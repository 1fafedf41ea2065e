//! Default configuration values

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "gantry.toml";

/// Alternative (hidden) configuration file name
pub const ALT_CONFIG_FILE: &str = ".gantry.toml";

/// Default backend executable: the wrapper script shipped with a build
/// root, looked up on PATH otherwise
pub const DEFAULT_BACKEND_EXECUTABLE: &str = "buildw";

/// Default flag asking the backend for an artifact manifest
pub const DEFAULT_QUERY_OUTPUTS_FLAG: &str = "--print-artifacts";

/// Default compiler-lock poll interval in milliseconds
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 300;

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_FILE, ALT_CONFIG_FILE]
}
