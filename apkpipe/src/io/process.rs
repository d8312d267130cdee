//! Running external tools: streamed or captured, with an optional timeout.
//!
//! Every stage talks to the outside world through [`ToolRunner`], so tests can
//! substitute a scripted runner and never spawn processes.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::{PipelineError, PipelineResult};
use crate::io::tools::Invocation;

/// Executes external tool invocations.
///
/// `Sync` so stages can fan artifacts out across a thread pool.
pub trait ToolRunner: Sync {
    /// Run with stdout/stderr going to the console. Non-zero exit is an error.
    fn run(&self, invocation: &Invocation) -> PipelineResult<()>;

    /// Run and return stdout, for callers that parse the result.
    fn capture(&self, invocation: &Invocation) -> PipelineResult<String>;
}

/// Options for [`SystemRunner`], resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Kill a tool that runs longer than this. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Bound on captured stdout/stderr kept in memory per stream.
    pub output_limit_bytes: usize,
    /// Buffer each tool's output and print it as one labelled block once the
    /// tool exits. Used when several artifacts are processed at once.
    pub attribute_output: bool,
    /// Send tool stdout to stderr, keeping stdout for a machine-readable report.
    pub quiet_stdout: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            output_limit_bytes: 1_000_000,
            attribute_output: false,
            quiet_stdout: false,
        }
    }
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    options: RunnerOptions,
}

impl SystemRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }
}

impl ToolRunner for SystemRunner {
    #[instrument(skip_all, fields(label = %invocation.label()))]
    fn run(&self, invocation: &Invocation) -> PipelineResult<()> {
        let line = invocation.command_line();
        info!("[RUN] {line}");

        if self.options.attribute_output {
            let output = run_captured(
                invocation.to_command(),
                &line,
                self.options.timeout,
                self.options.output_limit_bytes,
            )?;
            print_attributed(invocation.label(), &output, self.options.quiet_stdout);
            return check_status(&line, &output.status);
        }

        let status = run_streaming(
            invocation.to_command(),
            &line,
            self.options.timeout,
            self.options.quiet_stdout,
        )?;
        check_status(&line, &status)
    }

    #[instrument(skip_all, fields(label = %invocation.label()))]
    fn capture(&self, invocation: &Invocation) -> PipelineResult<String> {
        let line = invocation.command_line();
        debug!(command = %line, "capturing command output");
        let output = run_captured(
            invocation.to_command(),
            &line,
            self.options.timeout,
            self.options.output_limit_bytes,
        )?;
        if !output.stderr.is_empty() && !output.status.success() {
            warn!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "command stderr");
        }
        check_status(&line, &output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

fn check_status(line: &str, status: &ExitStatus) -> PipelineResult<()> {
    if status.success() {
        return Ok(());
    }
    warn!(exit_code = ?status.code(), command = %line, "command failed");
    Err(PipelineError::CommandFailed {
        command: line.to_string(),
        exit_code: status.code(),
    })
}

fn spawn(mut cmd: Command, line: &str) -> PipelineResult<Child> {
    debug!("spawning child process");
    cmd.spawn().map_err(|source| {
        error!(err = %source, command = %line, "failed to spawn command");
        PipelineError::Spawn {
            command: line.to_string(),
            source,
        }
    })
}

/// Wait for `child`, killing it if `timeout` elapses first.
fn wait_with_timeout(
    child: &mut Child,
    line: &str,
    timeout: Option<Duration>,
) -> PipelineResult<ExitStatus> {
    let Some(timeout) = timeout else {
        return child
            .wait()
            .map_err(|e| PipelineError::io(format!("wait for {line}"), e));
    };
    match child
        .wait_timeout(timeout)
        .map_err(|e| PipelineError::io(format!("wait for {line}"), e))?
    {
        Some(status) => Ok(status),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child
                .kill()
                .map_err(|e| PipelineError::io(format!("kill {line}"), e))?;
            child
                .wait()
                .map_err(|e| PipelineError::io(format!("wait for {line} after kill"), e))?;
            Err(PipelineError::TimedOut {
                command: line.to_string(),
                timeout,
            })
        }
    }
}

/// Run a command with inherited stdout/stderr for live visibility.
fn run_streaming(
    mut cmd: Command,
    line: &str,
    timeout: Option<Duration>,
    quiet_stdout: bool,
) -> PipelineResult<ExitStatus> {
    let stdout = if quiet_stdout {
        Stdio::from(std::io::stderr())
    } else {
        Stdio::inherit()
    };
    cmd.stdin(Stdio::null()).stdout(stdout).stderr(Stdio::inherit());
    let mut child = spawn(cmd, line)?;
    let status = wait_with_timeout(&mut child, line, timeout)?;
    debug!(exit_code = ?status.code(), "command finished");
    Ok(status)
}

/// Run a command and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
fn run_captured(
    mut cmd: Command,
    line: &str,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> PipelineResult<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = spawn(cmd, line)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || read_optional(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_optional(stderr, output_limit_bytes));

    let status = wait_with_timeout(&mut child, line, timeout)?;

    let (stdout, stdout_truncated) = join_output(stdout_handle, line)?;
    let (stderr, stderr_truncated) = join_output(stderr_handle, line)?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

fn join_output(
    handle: thread::JoinHandle<std::io::Result<(Vec<u8>, usize)>>,
    line: &str,
) -> PipelineResult<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result.map_err(|e| PipelineError::io(format!("read output of {line}"), e)),
        Err(_) => Err(PipelineError::io(
            format!("read output of {line}"),
            std::io::Error::other("output reader thread panicked"),
        )),
    }
}

fn read_optional<R: Read>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, usize)> {
    match reader {
        Some(reader) => read_stream_limited(reader, limit),
        None => Ok((Vec::new(), 0)),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

/// Print a finished tool's output as one block so parallel runs stay readable.
fn print_attributed(label: &str, output: &CommandOutput, quiet_stdout: bool) {
    let rendered = render_attributed(label, output);
    if rendered.is_empty() {
        return;
    }
    let written = if quiet_stdout {
        write_flushed(std::io::stderr().lock(), &rendered)
    } else {
        write_flushed(std::io::stdout().lock(), &rendered)
    };
    if let Err(e) = written {
        warn!(err = %e, "failed to write tool output");
    }
}

fn write_flushed(mut out: impl Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn render_attributed(label: &str, output: &CommandOutput) -> String {
    let mut buf = String::new();
    for (stream, bytes, truncated) in [
        ("stdout", &output.stdout, output.stdout_truncated),
        ("stderr", &output.stderr, output.stderr_truncated),
    ] {
        let text = String::from_utf8_lossy(bytes);
        for line in text.lines() {
            buf.push_str(&format!("[{label}] {line}\n"));
        }
        if truncated > 0 {
            buf.push_str(&format!("[{label}] [{stream} truncated {truncated} bytes]\n"));
        }
    }
    buf
}
