//! executor.rs - The command channel to the target device.
//!
//! Everything this crate knows about the remote side flows through two
//! operations: a read-only query that returns text, and a state-changing
//! command that returns a full [`CommandOutput`]. Command-level failure
//! (non-zero exit) is data inside `CommandOutput`, so callers can express
//! "log and continue" without error-based control flow; only a broken
//! channel surfaces as [`PrepError::DeviceUnavailable`].

use crate::error::{PrepError, Result};
use log::{debug, warn};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// The result of a state-changing shell command on the device.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal or timed out).
    pub exit_code: Option<i32>,
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
}

impl CommandOutput {
    /// One-line summary of a failed command, for logs and error messages.
    pub fn failure_summary(&self) -> String {
        format!(
            "exit code: {}, stderr: {}, stdout: {}",
            self.exit_code
                .map_or_else(|| "none".to_string(), |c| c.to_string()),
            self.stderr.trim(),
            self.stdout.trim()
        )
    }
}

/// Command execution on the target device.
///
/// Implementations block until the remote side responds or the transport's
/// own timeout elapses; this crate adds no timeout policy of its own beyond
/// passing the caller's limit through.
pub trait DeviceExecutor {
    /// Run a read-only probe (e.g. `lsmod`) and return its stdout.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the channel to the device is down.
    fn run_query(&self, command: &str) -> Result<String>;

    /// Run a state-changing command (e.g. `insmod`, `rmmod`).
    ///
    /// A command that runs but exits non-zero is NOT an error: it comes back
    /// as `Ok` with `success == false` so the caller decides whether that is
    /// fatal. Only channel failure returns `Err`.
    fn run_command(&self, command: &str, timeout: Duration) -> Result<CommandOutput>;
}

/// Poll interval while waiting for a local child process.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read a child pipe to the end on a background thread.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// A [`DeviceExecutor`] that runs commands on the local machine via `sh -c`.
///
/// Used by the CLI binary for self-hosted runs (preparing the machine the
/// process runs on). Harnesses talking to remote targets supply their own
/// executor over their transport.
#[derive(Debug, Default)]
pub struct LocalShell;

impl LocalShell {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceExecutor for LocalShell {
    fn run_query(&self, command: &str) -> Result<String> {
        debug!("query: {}", command);
        let output = Command::new("sh")
            .args(["-c", command])
            .output()
            .map_err(|e| {
                PrepError::device_unavailable(format!("failed to run '{}': {}", command, e))
            })?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_command(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        debug!("command: {} (timeout {}s)", command, timeout.as_secs());
        let mut child = Command::new("sh")
            .args(["-c", command])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                PrepError::device_unavailable(format!("failed to spawn '{}': {}", command, e))
            })?;

        // Drain both pipes concurrently; a child that fills a pipe buffer
        // would otherwise block on write and never exit.
        let stdout_reader = drain_pipe(child.stdout.take());
        let stderr_reader = drain_pipe(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("'{}' timed out after {}s, killing", command, timeout.as_secs());
                        let _ = child.kill();
                        let _ = child.wait();
                        // Killing the child closes the pipes, so the readers finish.
                        let stdout = stdout_reader.join().unwrap_or_default();
                        let mut stderr = stderr_reader.join().unwrap_or_default();
                        if !stderr.is_empty() && !stderr.ends_with('\n') {
                            stderr.push('\n');
                        }
                        stderr.push_str(&format!("timed out after {}s", timeout.as_secs()));
                        return Ok(CommandOutput {
                            stdout,
                            stderr,
                            exit_code: None,
                            success: false,
                        });
                    }
                    std::thread::sleep(WAIT_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(PrepError::device_unavailable(format!(
                        "failed waiting for '{}': {}",
                        command, e
                    )));
                }
            }
        };

        Ok(CommandOutput {
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}
