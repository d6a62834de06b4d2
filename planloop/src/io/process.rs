//! Helpers for running child processes with bounded output.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    /// Last non-blank stdout line, kept even when `stdout` was truncated.
    pub stdout_last_line: Option<String>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// Bytes collected from one pipe.
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
    last_line: Option<String>,
}

/// Run a command to completion, capturing stdout/stderr without risking pipe deadlocks.
///
/// Both pipes are drained concurrently until EOF. `output_limit_bytes` bounds how much of each
/// stream is kept in memory. When `stream_path` is `Some`, every stdout line is also written to
/// that file as it arrives. With `timeout` unset the call waits for the child indefinitely.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), output_limit_bytes, streaming = stream_path.is_some()))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
    stream_path: Option<&Path>,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let stream_file = match stream_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create stream dir {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("create stream file {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle =
        thread::spawn(move || read_lines_limited(stdout, output_limit_bytes, stream_file));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        if let Err(err) = child_stdin.write_all(input) {
            // The child closed stdin early; do not leave it running unsupervised.
            warn!(err = %err, "failed to write stdin, killing child");
            let _ = child.kill();
            let _ = child.wait();
            return Err(err).context("write stdin");
        }
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let mut timed_out = false;
    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    if stdout.truncated > 0 || stderr.truncated > 0 {
        warn!(
            stdout_truncated = stdout.truncated,
            stderr_truncated = stderr.truncated,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.bytes,
        stderr: stderr.bytes,
        stdout_truncated: stdout.truncated,
        stderr_truncated: stderr.truncated,
        stdout_last_line: stdout.last_line,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Captured>>) -> Result<Captured> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream line by line with a size limit, optionally tee-ing each line to a file.
fn read_lines_limited<R: Read>(
    reader: R,
    limit: usize,
    mut stream_file: Option<BufWriter<File>>,
) -> Result<Captured> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;
    let mut last_line = None;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Some(writer) = stream_file.as_mut() {
            // Flush per line so the file can be tailed while the agent runs.
            if let Err(e) = writer.write_all(&line) {
                warn!(err = %e, "failed to write to stream file");
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush stream file");
            }
        }

        let text = String::from_utf8_lossy(&line);
        if !text.trim().is_empty() {
            last_line = Some(text.trim_end().to_string());
        }

        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok(Captured {
        bytes: collected,
        truncated,
        last_line,
    })
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Captured> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
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

    Ok(Captured {
        bytes: buf,
        truncated,
        last_line: None,
    })
}
