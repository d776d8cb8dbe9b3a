//! Workflow collaborator: runs external programs with a timeout and
//! bounded output capture.
//!
//! A workflow is either a command line string (`"make deploy"`) or a record
//! `{"command": ["make", "deploy"], "stdin": "..."}`. Exit status 0 is
//! success and yields the trimmed stdout.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::collab::{Invoke, InvokeRequest};
use crate::core::types::Reply;

/// Output of one finished (or killed) child process.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped beyond the limit, stdout and stderr combined.
    pub truncated: usize,
    pub timed_out: bool,
}

pub struct ProcessWorkflows {
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessWorkflows {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
            output_limit_bytes,
        }
    }
}

impl Invoke for ProcessWorkflows {
    #[instrument(skip_all, fields(workflow = request.name))]
    fn invoke(&self, request: &InvokeRequest<'_>) -> Result<Reply> {
        let (argv, stdin) = workflow_argv(request.args)?;
        let Some((program, args)) = argv.split_first() else {
            return Ok(Reply::Failed("workflow has no command".to_string()));
        };
        info!(program = %program, "running workflow");

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.workdir);
        let captured = run_captured(
            cmd,
            stdin.as_deref().map(str::as_bytes),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run workflow '{program}'"))?;

        if captured.timed_out {
            return Ok(Reply::Failed(format!(
                "workflow '{program}' timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        let stdout = String::from_utf8_lossy(&captured.stdout).trim().to_string();
        if captured.status.success() {
            return Ok(Reply::Ok(if stdout.is_empty() {
                Value::Null
            } else {
                Value::String(stdout)
            }));
        }
        let stderr = String::from_utf8_lossy(&captured.stderr).trim().to_string();
        let code = captured
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        Ok(Reply::Failed(format!(
            "workflow '{program}' exited with {code}: {}",
            if stderr.is_empty() { stdout } else { stderr }
        )))
    }
}

fn workflow_argv(args: &Value) -> Result<(Vec<String>, Option<String>)> {
    match args {
        Value::String(line) => Ok((split_command_line(line)?, None)),
        Value::Object(spec) => {
            let argv = match spec.get("command") {
                Some(Value::String(line)) => split_command_line(line)?,
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                _ => return Err(anyhow!("workflow record needs a 'command'")),
            };
            let stdin = spec.get("stdin").and_then(Value::as_str).map(str::to_string);
            Ok((argv, stdin))
        }
        other => Err(anyhow!("unsupported workflow value: {other}")),
    }
}

/// Split on whitespace, honouring single and double quotes.
fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    argv.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(anyhow!("unterminated quote in '{line}'"));
    }
    if in_word {
        argv.push(current);
    }
    Ok(argv)
}

/// Run `cmd`, reading stdout and stderr concurrently so a chatty child
/// cannot deadlock on a full pipe. Bytes beyond `output_limit_bytes` per
/// stream are drained and counted but not kept.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_captured(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<Captured> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().inspect_err(|err| {
        error!(err = %err, "failed to spawn command");
    })
    .context("spawn command")?;

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_handle).context("join stderr")?;
    let truncated = stdout_dropped + stderr_dropped;
    if truncated > 0 {
        warn!(truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(Captured {
        status,
        stdout,
        stderr,
        truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .unwrap_or_else(|_| Err(anyhow!("output reader thread panicked")))
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((kept, dropped))
}
