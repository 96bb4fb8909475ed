//! Child-process runner with deadline enforcement
//!
//! Shared plumbing for every executor that spawns a toolchain or runtime:
//! - spawn with piped stdio, feed optional stdin from a task
//! - collect stdout/stderr concurrently so a chatty child cannot deadlock
//! - on deadline expiry, kill the child's whole process group and reap it
//!   instead of abandoning the wait; whatever output was already buffered is
//!   still returned
//!
//! Each child is spawned into its own process group. A shell-spawned
//! grandchild inherits the write end of our pipes, so killing only the direct
//! child would leave the pipes open and the drain below blocked until every
//! descendant exits.

use anyhow::{Context, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// How long after a group kill the pipe drain may take before partial output
/// is abandoned
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Command specification for execution
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Working directory (the request's private temp dir)
    pub work_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Create from a command vector (first element is program, rest are args)
    pub fn from_vec(cmd: &[String]) -> Self {
        let mut iter = cmd.iter();
        let program = iter.next().cloned().unwrap_or_default();
        let args: Vec<String> = iter.cloned().collect();
        Self {
            program,
            args,
            work_dir: None,
        }
    }
}

/// Raw outcome of waiting for a child process
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Process exited; -1 stands in for termination by signal
    Exited(i32),
    /// Deadline expired and the process was killed
    TimedOut,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Exited(0))
    }
}

/// Captured output of one child process run
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn timed_out(&self) -> bool {
        self.status == RunStatus::TimedOut
    }
}

/// Run a command to completion or until the deadline, whichever comes first.
///
/// The child's stdin is always piped and closed after `stdin_content` (if
/// any) has been written, so a child that reads stdin sees EOF rather than
/// blocking forever.
pub async fn run_command(
    spec: &CommandSpec,
    stdin_content: Option<&str>,
    timeout: Duration,
) -> Result<RunOutcome> {
    debug!(
        "Running {} {:?} (timeout {:?})",
        spec.program, spec.args, timeout
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(dir) = &spec.work_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", spec.program))?;
    let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));

    // Feed stdin from a task; a child that never reads must not block us, and
    // dropping the handle closes the pipe either way.
    let stdin_pipe = child.stdin.take();
    let stdin_owned = stdin_content.map(|s| s.to_string());
    let stdin_task = tokio::spawn(async move {
        if let (Some(mut pipe), Some(data)) = (stdin_pipe, stdin_owned) {
            let _ = pipe.write_all(data.as_bytes()).await;
        }
    });

    let mut stdout_pipe = child.stdout.take().context("Child stdout not captured")?;
    let mut stderr_pipe = child.stderr.take().context("Child stderr not captured")?;
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(exit) => {
            let exit = exit.context("Failed to wait for child process")?;
            RunStatus::Exited(exit.code().unwrap_or(-1))
        }
        Err(_) => {
            // Deadline hit: kill the whole group and reap so no descendant
            // outlives the call or keeps the pipes open.
            if let Some(pgid) = pgid {
                let _ = killpg(pgid, Signal::SIGKILL);
            }
            child.start_kill().ok();
            let _ = child.wait().await;
            debug!("Killed {} after {:?}", spec.program, timeout);
            RunStatus::TimedOut
        }
    };

    let _ = stdin_task.await;
    // After a kill the pipes close with the group; the grace bound keeps a
    // straggler from pinning this call open anyway.
    let (stdout, stderr) = if status == RunStatus::TimedOut {
        let stdout = tokio::time::timeout(DRAIN_GRACE, stdout_task)
            .await
            .ok()
            .and_then(|joined| joined.ok())
            .unwrap_or_default();
        let stderr = tokio::time::timeout(DRAIN_GRACE, stderr_task)
            .await
            .ok()
            .and_then(|joined| joined.ok())
            .unwrap_or_default();
        (stdout, stderr)
    } else {
        (
            stdout_task.await.unwrap_or_default(),
            stderr_task.await.unwrap_or_default(),
        )
    };

    Ok(RunOutcome {
        status,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    })
}
