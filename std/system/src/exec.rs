//! Shell process execution with deadlines and output caps.
//!
//! Every spawned command gets null stdin and piped stdout/stderr. On Unix the
//! child leads its own process group so a timeout can take down everything it
//! started, not just the shell.

use crate::{
    error::{ErrorKind, ProcessOutput, ToolError},
    options::ExecutionOptions,
};
use std::{
    io,
    process::Stdio,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
};

/// How long pipe readers may lag behind process exit.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Build the platform shell invocation for `command`.
pub fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    let std_cmd = {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };
    #[cfg(unix)]
    let std_cmd = {
        use std::os::unix::process::CommandExt;
        let mut cmd = std::process::Command::new("sh");
        cmd.args(["-c", command]).process_group(0);
        cmd
    };
    Command::from(std_cmd)
}

/// Run `command` through the shell.
///
/// Returns the captured output when the process exits with status zero.
/// Every other outcome is an error carrying whatever output was captured:
/// [`ErrorKind::Timeout`], [`ErrorKind::TooLarge`], [`ErrorKind::Signaled`] or
/// [`ErrorKind::NonZeroExit`].
pub async fn run_shell(
    command: &str,
    options: &ExecutionOptions,
) -> Result<ProcessOutput, ToolError> {
    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.working_directory {
        cmd.current_dir(dir);
    }
    if let Some(env) = &options.environment {
        cmd.envs(env);
    }

    let mut child = cmd.spawn().map_err(|e| spawn_error(&e, options))?;
    tracing::debug!(pid = ?child.id(), timeout_ms = options.timeout_ms, "spawned shell");

    let stdout = capture(child.stdout.take(), options.max_output_bytes);
    let stderr = capture(child.stderr.take(), options.max_output_bytes);

    let (status, timed_out) = match tokio::time::timeout(options.timeout(), child.wait()).await {
        Ok(status) => (status.map_err(wait_error)?, false),
        Err(_) => {
            tracing::warn!(timeout_ms = options.timeout_ms, "process timed out, killing");
            kill_tree(&mut child).await;
            (child.wait().await.map_err(wait_error)?, true)
        }
    };

    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;
    let output = ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
        exit_code: status.code(),
        signal: termination_signal(&status),
        timed_out,
    };

    if timed_out {
        let message = format!("Command timed out after {} ms", options.timeout_ms);
        return Err(ToolError::new(ErrorKind::Timeout, message).with_output(output));
    }
    if stdout.truncated || stderr.truncated {
        let message = format!(
            "Command output exceeded the maximum buffer size of {} bytes",
            options.max_output_bytes
        );
        return Err(ToolError::new(ErrorKind::TooLarge, message).with_output(output));
    }
    if status.success() {
        return Ok(output);
    }
    let err = match (&output.signal, output.exit_code) {
        (Some(signal), _) => ToolError::new(
            ErrorKind::Signaled,
            format!("Command was terminated by signal {signal}"),
        ),
        (None, Some(code)) => ToolError::new(
            ErrorKind::NonZeroExit,
            format!("Command failed with exit code {code}"),
        ),
        (None, None) => ToolError::new(ErrorKind::NonZeroExit, "Command failed"),
    };
    Err(err.with_output(output))
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// A pipe reader task and the buffer it fills.
struct Capture {
    buffer: Arc<Mutex<Captured>>,
    task: JoinHandle<()>,
}

/// Drain `reader` on a separate task, keeping at most `limit` bytes.
///
/// Reading stops at the limit; the closed pipe then stops the writer.
fn capture<R>(reader: Option<R>, limit: usize) -> Option<Capture>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = reader?;
    let buffer = Arc::new(Mutex::new(Captured::default()));
    let sink = Arc::clone(&buffer);
    let task = tokio::spawn(async move {
        let mut chunk = vec![0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut captured = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    let room = limit.saturating_sub(captured.bytes.len());
                    if n > room {
                        captured.bytes.extend_from_slice(&chunk[..room]);
                        captured.truncated = true;
                        break;
                    }
                    captured.bytes.extend_from_slice(&chunk[..n]);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "pipe read failed");
                    break;
                }
            }
        }
    });
    Some(Capture { buffer, task })
}

/// Wait for a reader to hit end of file, then take what it read.
///
/// A background grandchild may keep the pipe open after the shell exits. The
/// reader is then abandoned after [`READER_GRACE`] and the bytes read so far
/// are kept.
async fn collect(capture: Option<Capture>) -> Captured {
    let Some(Capture { buffer, mut task }) = capture else {
        return Captured::default();
    };
    match tokio::time::timeout(READER_GRACE, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "output reader task failed"),
        Err(_) => {
            task.abort();
            tracing::debug!("output pipe still open after process exit");
        }
    }
    let mut captured = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *captured)
}

async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if result == 0 {
            return;
        }
        tracing::debug!(error = %io::Error::last_os_error(), "killpg failed");
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill timed out process");
    }
}

fn spawn_error(err: &io::Error, options: &ExecutionOptions) -> ToolError {
    let cwd_error = matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    );
    let missing_dir = options
        .working_directory
        .as_deref()
        .filter(|dir| cwd_error && !dir.is_dir());
    if let Some(dir) = missing_dir {
        return ToolError::new(
            ErrorKind::NotFound,
            format!("Working directory not found: {}", dir.display()),
        );
    }
    ToolError::new(
        ErrorKind::from_io(err),
        format!("Failed to spawn process: {err}"),
    )
}

fn wait_error(err: io::Error) -> ToolError {
    ToolError::internal(format!("Failed to wait for process: {err}"))
}

#[cfg(unix)]
fn termination_signal(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn termination_signal(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

/// Conventional name of a Unix signal number.
#[cfg(unix)]
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        _ => return format!("SIG{signal}"),
    };
    name.to_string()
}
