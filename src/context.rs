//! Startup-resolved state shared by every call of one server instance.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::driver;
use crate::config::BridgeConfig;
use crate::errors::{BridgeError, Result};
use crate::mcp::catalog::Domain;

/// Everything needed to locate and launch the backend interpreter.
///
/// Built once in `main` and shared behind an `Arc`; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub domain: Domain,
    /// Interpreter executable.
    pub interpreter: PathBuf,
    /// Arguments placed before the temp-input path: the script, or the driver invocation.
    pub interpreter_args: Vec<OsString>,
    /// Working directory of each spawned interpreter.
    pub working_dir: PathBuf,
    /// Extra environment for each spawned interpreter.
    pub env: Vec<(String, String)>,
    /// Directory holding temp input files.
    pub temp_dir: PathBuf,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub max_concurrent_calls: usize,
}

impl ServerContext {
    /// Resolves a context from configuration.
    ///
    /// `base_dir` anchors relative paths, normally the current directory.
    pub fn resolve(domain: Domain, config: &BridgeConfig, base_dir: &Path) -> Result<Self> {
        config.validate()?;

        let backend_root = match &config.backend_root {
            Some(root) => absolutize(base_dir, root),
            None => base_dir.to_path_buf(),
        };
        let repo_root = backend_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| backend_root.clone());
        // An explicit script is run as-is. Otherwise class-based domains go
        // through the driver and the rest run their module file.
        let (module_dir, interpreter_args) = match &config.script {
            Some(script) => {
                let script = absolutize(base_dir, script);
                let dir = script.parent().map(Path::to_path_buf);
                (dir, vec![script.into_os_string()])
            }
            None => {
                let dir = repo_root.join(domain.module_dir());
                let args = match domain.entry_class() {
                    Some(class) => driver::driver_args(domain.module_name(), class),
                    None => vec![repo_root.join(domain.default_script()).into_os_string()],
                };
                (Some(dir), args)
            }
        };
        let working_dir = config
            .working_dir
            .as_deref()
            .map(|dir| absolutize(base_dir, dir))
            .unwrap_or_else(|| backend_root.clone());

        let mut search_path = vec![backend_root.clone()];
        search_path.extend(module_dir);
        search_path.extend(config.python_path.iter().map(|p| absolutize(base_dir, p)));
        let python_path = std::env::join_paths(&search_path).map_err(|e| BridgeError::Config {
            message: format!("invalid module search path entry: {}", e),
        })?;

        let temp_dir = config
            .temp_dir
            .as_deref()
            .map(|dir| absolutize(base_dir, dir))
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            domain,
            interpreter: PathBuf::from(&config.python),
            interpreter_args,
            working_dir,
            env: vec![
                (
                    "PYTHONPATH".to_string(),
                    python_path.to_string_lossy().into_owned(),
                ),
                ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
            ],
            temp_dir,
            timeout: Duration::from_millis(config.timeout_ms),
            max_output_bytes: config.max_output_bytes,
            max_concurrent_calls: config.max_concurrent_calls,
        })
    }

    /// Builds a context that launches an arbitrary command; used by tests
    /// and by deployments whose backend is not a Python script.
    pub fn with_command(
        domain: Domain,
        interpreter: impl Into<PathBuf>,
        interpreter_args: Vec<OsString>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let working_dir = working_dir.into();
        Self {
            domain,
            interpreter: interpreter.into(),
            interpreter_args,
            temp_dir: std::env::temp_dir(),
            working_dir,
            env: Vec::new(),
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            max_output_bytes: crate::config::DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent_calls: crate::config::DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_max_concurrent_calls(mut self, n: usize) -> Self {
        self.max_concurrent_calls = n.max(1);
        self
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
