//! GL-020: Local process execution with a hard deadline.
//!
//! Every child gets an explicit argv (no shell string concatenation here),
//! piped stdout/stderr drained on reader threads, and a deadline enforced by
//! polling `try_wait` and killing the child's process group once it passes.

use crate::core::error::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output from a finished child process.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout on success, `NonZeroExit` otherwise.
    pub fn into_stdout(self) -> Result<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(Error::NonZeroExit {
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Spawn `program args...` in `working_dir` and wait up to `timeout`.
///
/// The child leads its own process group. On deadline the whole group is
/// killed, including background descendants still holding the output pipes.
/// A timeout too large to represent as an instant means no deadline.
pub fn run_argv(
    program: &str,
    args: &[&str],
    working_dir: &Path,
    timeout: Duration,
) -> Result<ExecOutput> {
    let spawn_error = |e: std::io::Error| Error::Adapter {
        adapter: "process".to_string(),
        message: format!(
            "failed to spawn {} in {}: {}",
            program,
            working_dir.display(),
            e
        ),
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn().map_err(spawn_error)?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now().checked_add(timeout);
    let timed_out = |child: &mut Child| {
        kill_tree(child);
        tracing::warn!(program, secs = timeout.as_secs(), "killed child after timeout");
        Error::Timeout(timeout.as_secs())
    };

    let status = loop {
        match child.try_wait().map_err(spawn_error)? {
            Some(status) => break status,
            None if deadline.is_some_and(|d| Instant::now() >= d) => {
                return Err(timed_out(&mut child));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
    else {
        return Err(timed_out(&mut child));
    };

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Run `bash -c <command>`; non-zero exit is an error.
pub fn run_bash(command: &str, working_dir: &Path, timeout_secs: u64) -> Result<String> {
    run_argv(
        "bash",
        &["-c", command],
        working_dir,
        Duration::from_secs(timeout_secs),
    )?
    .into_stdout()
}

/// Kill the child's process group, then the child itself.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let group = format!("-{}", child.id());
        let _ = Command::new("kill")
            .args(["-KILL", "--", &group])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a drained pipe. `None` when the deadline passes first.
fn collect(rx: Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let received = match deadline {
        Some(d) => rx.recv_timeout(d.saturating_duration_since(Instant::now())),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}
