use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{BridgeError, Result};

/// How long to keep draining pipes after the interpreter has exited.
///
/// A grandchild that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// One interpreter launch.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    /// Cap on captured bytes per stream; the excess is drained and discarded.
    pub max_output_bytes: usize,
}

/// Captured result of a finished interpreter run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Runs one interpreter process to completion or timeout.
///
/// The child gets a null stdin (the bridge's stdin is the protocol stream),
/// runs in its own process group, and is killed together with that group
/// when `spec.timeout` elapses. Nothing is shared between calls.
pub async fn run(spec: &ProcessSpec) -> Result<ProcessOutput> {
    let started = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| BridgeError::ProcessSpawn {
        command: spec.program.display().to_string(),
        message: e.to_string(),
    })?;
    let pid = child.id();
    debug!(pid, program = %spec.program.display(), "spawned interpreter");

    let stdout = child.stdout.take().ok_or_else(|| BridgeError::Internal {
        message: "interpreter stdout was not captured".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| BridgeError::Internal {
        message: "interpreter stderr was not captured".to_string(),
    })?;
    let mut stdout_task = tokio::spawn(read_capped(stdout, spec.max_output_bytes));
    let mut stderr_task = tokio::spawn(read_capped(stderr, spec.max_output_bytes));

    let status = match tokio::time::timeout(spec.timeout, child.wait()).await {
        Ok(status) => status.map_err(|e| BridgeError::Internal {
            message: format!("failed to wait for interpreter: {}", e),
        })?,
        Err(_) => {
            warn!(
                pid,
                timeout_ms = spec.timeout.as_millis() as u64,
                "interpreter timed out, killing process group"
            );
            terminate(&mut child, pid).await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(BridgeError::ProcessTimeout {
                timeout_ms: spec.timeout.as_millis() as u64,
            });
        }
    };

    let (mut out, mut err) = tokio::join!(drain(&mut stdout_task), drain(&mut stderr_task));
    if out.is_none() || err.is_none() {
        warn!(pid, "interpreter output pipes stayed open after exit, killing process group");
        kill_group(pid);
        // With the group gone the pipes close, so whatever was read is recovered.
        if out.is_none() {
            out = drain(&mut stdout_task).await;
        }
        if err.is_none() {
            err = drain(&mut stderr_task).await;
        }
        stdout_task.abort();
        stderr_task.abort();
    }
    let out = out.unwrap_or_default();
    let err = err.unwrap_or_default();

    let output = ProcessOutput {
        pid,
        exit_code: status.code(),
        success: status.success(),
        stdout: String::from_utf8_lossy(&out.bytes).into_owned(),
        stderr: String::from_utf8_lossy(&err.bytes).into_owned(),
        stdout_truncated: out.truncated,
        stderr_truncated: err.truncated,
        elapsed: started.elapsed(),
    };
    debug!(
        pid,
        exit_code = ?output.exit_code,
        elapsed_ms = output.elapsed.as_millis() as u64,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "interpreter exited"
    );
    if output.stdout_truncated || output.stderr_truncated {
        warn!(pid, cap = spec.max_output_bytes, "interpreter output exceeded capture cap");
    }
    Ok(output)
}

/// Reads `reader` to EOF, keeping at most `cap` bytes.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.bytes.len());
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
        if n > room {
            captured.truncated = true;
        }
    }
    Ok(captured)
}

/// Waits briefly for a reader task. `None` means the pipe never closed.
async fn drain(task: &mut JoinHandle<std::io::Result<Captured>>) -> Option<Captured> {
    match tokio::time::timeout(OUTPUT_DRAIN_GRACE, task).await {
        Ok(Ok(Ok(captured))) => Some(captured),
        Ok(Ok(Err(e))) => {
            debug!(error = %e, "failed to read interpreter output");
            Some(Captured::default())
        }
        Ok(Err(e)) => {
            debug!(error = %e, "interpreter output reader failed");
            Some(Captured::default())
        }
        Err(_) => None,
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    // Also reaps the child so no zombie is left behind.
    if let Err(e) = child.kill().await {
        debug!(pid, error = %e, "failed to kill interpreter");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // SAFETY: killpg has no memory-safety preconditions. The child was
    // spawned with process_group(0), so its pid is also its group id.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
