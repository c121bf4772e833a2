//! Child-process execution: synchronous capture or detached spawn.

pub mod capture;

pub use capture::Stream;

use std::io;
use std::process::Stdio;

use log::debug;
use tokio::process::Command;

use crate::config::Settings;

/// Reference capture ceiling per stream: 50 MiB, enough for large diffs and build logs.
pub const DEFAULT_MAX_BUFFER: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn command: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to capture output: {0}")]
    Capture(#[source] io::Error),

    #[error("{stream} exceeded output limit of {limit} bytes")]
    OutputLimitExceeded { stream: Stream, limit: usize },

    #[error("Background process exited before its PID could be read")]
    MissingPid,
}

/// What a finished invocation produced. A command either has output or a PID, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Combined stdout/stderr of a command that ran to completion.
    Captured { text: String },
    /// A detached command still running under `pid`.
    Detached { pid: u32 },
}

impl Outcome {
    pub fn into_text(self) -> String {
        match self {
            Outcome::Captured { text } => text,
            Outcome::Detached { pid } => format!("Command started in background with PID {pid}"),
        }
    }
}

/// Runs command strings through a shell. Holds no per-invocation state.
#[derive(Debug, Clone)]
pub struct Runner {
    shell: String,
    max_buffer: usize,
}

impl Runner {
    pub fn new(shell: impl Into<String>, max_buffer: usize) -> Self {
        Self {
            shell: shell.into(),
            max_buffer,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.shell.clone(), settings.max_buffer_bytes)
    }

    pub fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    /// Execute `command`, waiting for it or detaching from it.
    ///
    /// Exit status never turns into an error: commands like builds and linters
    /// report failure in their output, and that output is what the caller wants.
    pub async fn execute(&self, command: &str, wait_for_completion: bool) -> Result<Outcome, ExecError> {
        if wait_for_completion {
            self.run_captured(command).await
        } else {
            self.spawn_detached(command)
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        cmd
    }

    async fn run_captured(&self, command: &str) -> Result<Outcome, ExecError> {
        let mut child = self
            .command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Capture(io::Error::other("stdout was not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Capture(io::Error::other("stderr was not piped")))?;

        // Both pipes drain together; a child blocked on a full stderr pipe
        // would otherwise never close stdout.
        let captured = tokio::try_join!(
            capture::read_bounded(stdout, self.max_buffer, Stream::Stdout),
            capture::read_bounded(stderr, self.max_buffer, Stream::Stderr),
        );

        let (out, err) = match captured {
            Ok(streams) => streams,
            Err(e) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e);
            }
        };

        let status = child.wait().await.map_err(ExecError::Capture)?;
        debug!("command exited with {status}: {command}");

        Ok(Outcome::Captured {
            text: capture::combine(&out, &err),
        })
    }

    fn spawn_detached(&self, command: &str) -> Result<Outcome, ExecError> {
        let mut cmd = self.command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        cmd.process_group(0);

        // The handle is dropped without kill_on_drop; the runtime reaps the
        // child whenever it exits.
        let child = cmd.spawn().map_err(ExecError::Spawn)?;
        let pid = child.id().ok_or(ExecError::MissingPid)?;
        debug!("detached pid {pid}: {command}");

        Ok(Outcome::Detached { pid })
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new("/bin/sh", DEFAULT_MAX_BUFFER)
    }
}
