use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ServerContext;
use crate::errors::{BridgeError, Result};

use super::codec;
use super::runner::{self, ProcessOutput, ProcessSpec};
use super::{tail_excerpt, STDERR_EXCERPT_CHARS};

/// Something that can execute a backend method out of process.
///
/// The dispatcher only sees this trait, so the transport to the backend
/// (one subprocess per call today) can change without touching it.
#[async_trait]
pub trait ExternalWorker: Send + Sync {
    async fn invoke(&self, method: &str, args: &Map<String, Value>) -> Result<Value>;
}

/// Runs each invocation in a fresh interpreter process.
pub struct SubprocessWorker {
    ctx: Arc<ServerContext>,
    launches: AtomicU64,
}

impl SubprocessWorker {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            ctx,
            launches: AtomicU64::new(0),
        }
    }

    /// Number of interpreter launches attempted so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    fn spec_for(&self, input: &Path) -> ProcessSpec {
        let mut args = self.ctx.interpreter_args.clone();
        args.push(input.as_os_str().to_os_string());
        ProcessSpec {
            program: self.ctx.interpreter.clone(),
            args,
            env: self.ctx.env.clone(),
            cwd: self.ctx.working_dir.clone(),
            timeout: self.ctx.timeout,
            max_output_bytes: self.ctx.max_output_bytes,
        }
    }
}

#[async_trait]
impl ExternalWorker for SubprocessWorker {
    async fn invoke(&self, method: &str, args: &Map<String, Value>) -> Result<Value> {
        let input = codec::encode(
            &self.ctx.temp_dir,
            self.ctx.domain.temp_prefix(),
            method,
            args,
        )?;
        let spec = self.spec_for(input.path());
        debug!(method, input = %input.path().display(), "invoking backend");

        self.launches.fetch_add(1, Ordering::Relaxed);
        let outcome = runner::run(&spec).await;

        // Dropping the handle also removes the file, which covers cancellation.
        let input_path = input.path().to_path_buf();
        if let Err(e) = input.close() {
            warn!(path = %input_path.display(), error = %e, "failed to remove input file");
        }

        interpret(method, outcome?)
    }
}

/// Turns a finished run into the call's result.
///
/// A zero exit decodes stdout. A non-zero exit still decodes stdout when
/// there is any, since the backend reports structured failures that way;
/// otherwise stderr explains the failure.
fn interpret(method: &str, output: ProcessOutput) -> Result<Value> {
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        let excerpt = tail_excerpt(stderr, STDERR_EXCERPT_CHARS);
        if output.success {
            debug!(method, pid = output.pid, stderr = %excerpt, "backend stderr");
        } else {
            warn!(
                method,
                pid = output.pid,
                exit_code = ?output.exit_code,
                stderr = %excerpt,
                "backend failed"
            );
        }
    }

    let non_zero = || BridgeError::NonZeroExit {
        code: output.exit_code,
        stderr: tail_excerpt(stderr, STDERR_EXCERPT_CHARS),
    };

    if output.success {
        return codec::decode(&output.stdout);
    }
    if output.stdout.trim().is_empty() {
        return Err(non_zero());
    }
    match codec::decode(&output.stdout) {
        Err(BridgeError::Decode { .. }) => Err(non_zero()),
        other => other,
    }
}
