//! Command execution utilities

use crate::error::{ProbeError, Result};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Execute a command and return its trimmed stdout.
///
/// The child is killed if it has not exited within `timeout`.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ProbeError::CommandNotFound(program.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    // Drain both pipes so a chatty child cannot block on a full buffer
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!(program, ?timeout, "Command timed out, killing it");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProbeError::CommandTimedOut {
                program: program.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    // A grandchild may still hold the pipes open; stop waiting at the deadline
    let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
    else {
        warn!(program, ?timeout, "Command output still open after exit, giving up");
        return Err(ProbeError::CommandTimedOut {
            program: program.to_string(),
            timeout,
        });
    };
    debug!(program, code = ?status.code(), "Command finished");

    if status.success() {
        Ok(stdout.trim().to_string())
    } else {
        Err(ProbeError::CommandFailed {
            program: program.to_string(),
            code: status.code(),
            stderr: stderr.trim().to_string(),
        })
    }
}

/// Read a pipe to the end on its own thread. The thread is detached and
/// exits once every writer has closed the pipe.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// `None` if the pipe is still open at `deadline`
fn collect(rx: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}

/// Runs external tools on behalf of the collectors
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<String>;
}

/// Spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<String> {
        run_command(program, args, timeout)
    }
}

/// Resolve a program on PATH
pub fn resolve_command(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Check if a command exists in PATH
pub fn command_exists(program: &str) -> bool {
    resolve_command(program).is_some()
}
