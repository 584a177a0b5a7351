use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, Result};

/// Environment variable overriding the interpreter executable.
pub const ENV_PYTHON: &str = "BIDBRIDGE_PYTHON";
/// Environment variable overriding the backend root directory.
pub const ENV_BACKEND_ROOT: &str = "BIDBRIDGE_BACKEND_ROOT";
/// Environment variable overriding the interpreter entry script.
pub const ENV_SCRIPT: &str = "BIDBRIDGE_SCRIPT";
/// Environment variable overriding the interpreter working directory.
pub const ENV_WORKDIR: &str = "BIDBRIDGE_WORKDIR";
/// Environment variable overriding the temp-input directory.
pub const ENV_TEMP_DIR: &str = "BIDBRIDGE_TEMP_DIR";
/// Environment variable overriding the per-call timeout.
pub const ENV_TIMEOUT_MS: &str = "BIDBRIDGE_TIMEOUT_MS";
/// Environment variable overriding the concurrent subprocess bound.
pub const ENV_MAX_CONCURRENT: &str = "BIDBRIDGE_MAX_CONCURRENT";

/// Default per-call timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Default cap on captured stdout/stderr bytes per stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default bound on concurrently running interpreter processes.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;

/// Bridge configuration.
///
/// Resolved in three layers: an optional TOML file, then `BIDBRIDGE_*`
/// environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter executable (looked up on `PATH` when not absolute).
    pub python: String,
    /// Root of the backend package tree; first entry on the module search path.
    pub backend_root: Option<PathBuf>,
    /// Interpreter entry script. Defaults to the domain's script under the repository.
    pub script: Option<PathBuf>,
    /// Working directory for the interpreter. Defaults to `backend_root`.
    pub working_dir: Option<PathBuf>,
    /// Extra module search path entries, appended after the defaults.
    pub python_path: Vec<PathBuf>,
    /// Directory for temp input files. Defaults to the OS temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Upper bound for a single interpreter run.
    pub timeout_ms: u64,
    /// Maximum bytes captured from each of stdout and stderr.
    pub max_output_bytes: usize,
    /// Maximum interpreter processes alive at once.
    pub max_concurrent_calls: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            backend_root: None,
            script: None,
            working_dir: None,
            python_path: Vec::new(),
            temp_dir: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }
}

impl BridgeConfig {
    /// Applies `BIDBRIDGE_*` overrides obtained through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests independent of the real
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(python) = lookup(ENV_PYTHON) {
            self.python = python;
        }
        if let Some(root) = lookup(ENV_BACKEND_ROOT) {
            self.backend_root = Some(PathBuf::from(root));
        }
        if let Some(script) = lookup(ENV_SCRIPT) {
            self.script = Some(PathBuf::from(script));
        }
        if let Some(dir) = lookup(ENV_WORKDIR) {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup(ENV_TEMP_DIR) {
            self.temp_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_env_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENT) {
            self.max_concurrent_calls = parse_env_number(ENV_MAX_CONCURRENT, &raw)?;
        }
        Ok(())
    }

    /// Rejects values that would make every call fail.
    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            return Err(BridgeError::Config {
                message: "interpreter executable must not be empty".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(BridgeError::Config {
                message: "timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_calls == 0 {
            return Err(BridgeError::Config {
                message: "max_concurrent_calls must be greater than zero".to_string(),
            });
        }
        if self.max_output_bytes == 0 {
            return Err(BridgeError::Config {
                message: "max_output_bytes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| BridgeError::Config {
        message: format!("{} must be a non-negative integer, got '{}'", name, raw),
    })
}

/// Loads the configuration from a TOML file.
///
/// When `path` is `None` the defaults are returned. Unspecified keys fall
/// back to their defaults.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let Some(config_path) = path else {
        return Ok(BridgeConfig::default());
    };

    let contents = fs::read_to_string(config_path).map_err(|e| BridgeError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: BridgeConfig = toml::from_str(&contents).map_err(|e| BridgeError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    Ok(config)
}
