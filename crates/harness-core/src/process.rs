//! Shell subprocess execution shared by scenario steps, roles, fixes and builds.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{HarnessError, Result};

/// Maximum characters kept in compact tails embedded into findings and metadata.
pub const TAIL_CHARS: usize = 800;

/// Exit code recorded when a deadline kills the process.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Captured result of a shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Trimmed stdout and stderr joined by a newline, cut to the trailing
    /// [`TAIL_CHARS`] characters.
    pub fn combined_tail(&self) -> String {
        let combined = format!("{}\n{}", self.stdout, self.stderr);
        tail_chars(combined.trim(), TAIL_CHARS).to_string()
    }
}

/// How long a killed child's pipes are drained before reading stops.
const KILL_GRACE: Duration = Duration::from_millis(50);

/// Run `command` through `sh -c` in `cwd`, capturing stdout and stderr.
///
/// With a `timeout`, the child is killed once the deadline passes and the
/// output carries [`TIMEOUT_EXIT_CODE`] with `timed_out` set. Whatever the
/// command printed before the deadline is kept and the timeout note is
/// appended to stderr. Failing to spawn the shell at all is an execution
/// error.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    envs: &[(&str, String)],
    timeout: Option<Duration>,
) -> Result<ShellOutput> {
    let start = Instant::now();

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    debug!(command = %command, cwd = ?cwd, "spawning shell");
    let mut child = cmd
        .spawn()
        .map_err(|e| HarnessError::Execution(format!("spawn `{command}`: {e}")))?;
    let stdout = Capture::spawn(child.stdout.take());
    let stderr = Capture::spawn(child.stderr.take());

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_elapsed) => {
                let limit_ms = limit.as_millis() as u64;
                warn!(command = %command, limit_ms, "shell command timed out");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill after timeout");
                }
                let stdout = stdout.finish_within(KILL_GRACE).await;
                let mut stderr = stderr.finish_within(KILL_GRACE).await;
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&format!("timed out after {limit_ms} ms"));
                return Ok(ShellOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout,
                    stderr,
                    duration_ms: start.elapsed().as_millis() as u64,
                    timed_out: true,
                });
            }
        },
        None => child.wait().await?,
    };

    Ok(ShellOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout.finish().await,
        stderr: stderr.finish().await,
        duration_ms: start.elapsed().as_millis() as u64,
        timed_out: false,
    })
}

/// A child pipe drained into a shared buffer by a background task.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });
        Self { buf, task }
    }

    /// Read to end of stream.
    async fn finish(self) -> String {
        let Capture { buf, task } = self;
        if let Err(e) = task.await {
            debug!(error = %e, "pipe reader stopped");
        }
        lossy(&buf)
    }

    /// Read until end of stream or `grace` elapses, whichever comes first.
    /// Grandchildren may still hold the pipe open after the shell is killed.
    async fn finish_within(self, grace: Duration) -> String {
        let Capture { buf, mut task } = self;
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            task.abort();
        }
        lossy(&buf)
    }
}

fn lossy(buf: &Mutex<Vec<u8>>) -> String {
    buf.lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// The last `n` characters of `s`.
pub fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let skip = count - n;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
