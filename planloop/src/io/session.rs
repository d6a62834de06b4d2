//! Agent session abstraction.
//!
//! The [`AgentClient`] trait decouples task orchestration from the agent
//! backend (currently the `claude` CLI). A session is an opaque handle bound to
//! one role; its transcript lives behind the client and is never inspected by
//! the controller. Tests use scripted clients that rewrite the plan document
//! instead of spawning processes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::io::config::AgentConfig;
use crate::io::process::{CommandOutput, run_command};

/// Which agent role a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Worker,
    Reviewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque conversational session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    id: String,
    role: Role,
    turns: u32,
}

impl SessionHandle {
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Completed runs on this session.
    pub fn turns(&self) -> u32 {
        self.turns
    }
}

/// Capability to open sessions and run prompts on them.
pub trait AgentClient {
    /// Open a new session for `role`.
    fn create_session(&self, role: Role) -> Result<SessionHandle>;

    /// Run `prompt` on `session` to completion and return the final output text.
    ///
    /// `session.turns() == 0` means this is the first run on the session.
    fn run(&self, session: &SessionHandle, prompt: &str) -> Result<String>;
}

/// Run a prompt on a session and advance its turn counter on success.
#[instrument(skip_all, fields(role = %session.role(), session_id = session.id(), turn = session.turns() + 1))]
pub fn run_to_completion<C: AgentClient + ?Sized>(
    client: &C,
    session: &mut SessionHandle,
    prompt: &str,
) -> Result<String> {
    let output = client.run(session, prompt)?;
    session.turns += 1;
    debug!(output_bytes = output.len(), "session turn completed");
    Ok(output)
}

/// Client that spawns the `claude` CLI in print mode.
///
/// The first run on a handle starts the session with `--session-id`; later runs
/// continue it with `--resume`, so each role keeps its own conversation.
#[derive(Debug, Clone)]
pub struct ClaudeCliClient {
    workdir: PathBuf,
    config: AgentConfig,
}

impl ClaudeCliClient {
    pub fn new(workdir: impl Into<PathBuf>, config: AgentConfig) -> Self {
        Self {
            workdir: workdir.into(),
            config,
        }
    }

    fn model_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Worker => self.config.worker_model.as_deref(),
            Role::Reviewer => self.config.reviewer_model.as_deref(),
        }
    }

    fn build_command(&self, session: &SessionHandle) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            // stream-json requires --verbose in print mode.
            .arg("--verbose")
            .args(&self.config.extra_args);
        if let Some(model) = self.model_for(session.role()) {
            cmd.arg("--model").arg(model);
        }
        if session.turns() == 0 {
            cmd.arg("--session-id").arg(session.id());
        } else {
            cmd.arg("--resume").arg(session.id());
        }
        cmd.current_dir(&self.workdir);
        cmd
    }

    fn transcript_paths(&self, session: &SessionHandle) -> Option<(PathBuf, PathBuf)> {
        let dir = self.config.transcript_dir.as_ref()?;
        let session_dir = self.workdir.join(dir).join(session.id());
        let turn = session.turns() + 1;
        Some((
            session_dir.join(format!("{turn}.jsonl")),
            session_dir.join(format!("{turn}.log")),
        ))
    }
}

impl AgentClient for ClaudeCliClient {
    fn create_session(&self, role: Role) -> Result<SessionHandle> {
        let session = SessionHandle::new(role, Uuid::new_v4().to_string());
        debug!(%role, session_id = session.id(), "created session");
        Ok(session)
    }

    #[instrument(skip_all, fields(role = %session.role(), session_id = session.id(), resume = session.turns() > 0))]
    fn run(&self, session: &SessionHandle, prompt: &str) -> Result<String> {
        info!(workdir = %self.workdir.display(), "starting claude");
        let transcript = self.transcript_paths(session);
        let output = run_command(
            self.build_command(session),
            Some(prompt.as_bytes()),
            self.config.timeout(),
            self.config.output_limit_bytes,
            transcript.as_ref().map(|(stream, _)| stream.as_path()),
        )
        .with_context(|| format!("run {}", self.config.program))?;

        if let Some((_, log_path)) = &transcript {
            write_invocation_log(
                log_path,
                session,
                prompt,
                &output,
                self.config.output_limit_bytes,
            )?;
        }

        if output.timed_out {
            warn!("claude timed out");
            return Err(anyhow!(
                "{} timed out after {:?}",
                self.config.program,
                self.config.timeout()
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "claude failed");
            return Err(anyhow!(
                "{} failed with status {:?}: {}",
                self.config.program,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let event = find_result_event(&output)
            .ok_or_else(|| anyhow!("no result event in {} output", self.config.program))?;
        if event.is_error {
            return Err(anyhow!(
                "agent reported error ({}): {}",
                event.subtype.as_deref().unwrap_or("unknown"),
                event.result.as_deref().unwrap_or("").trim()
            ));
        }
        debug!("claude completed successfully");
        Ok(event.result.unwrap_or_default())
    }
}

/// Final event of a `stream-json` run.
#[derive(Debug, Deserialize)]
struct ResultEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
}

fn parse_result_event(line: &str) -> Option<ResultEvent> {
    let event: ResultEvent = serde_json::from_str(line.trim()).ok()?;
    (event.kind == "result").then_some(event)
}

fn find_result_event(output: &CommandOutput) -> Option<ResultEvent> {
    if let Some(event) = output.stdout_last_line.as_deref().and_then(parse_result_event) {
        return Some(event);
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .rev()
        .find_map(parse_result_event)
}

fn write_invocation_log(
    path: &Path,
    session: &SessionHandle,
    prompt: &str,
    output: &CommandOutput,
    output_limit: usize,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str(&format!(
        "role: {}\nsession: {}\nturn: {}\n",
        session.role(),
        session.id(),
        session.turns() + 1
    ));
    buf.push_str("\n=== prompt ===\n");
    buf.push_str(prompt);
    buf.push_str("\n=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("agent"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("agent"));
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }

    if buf.len() > output_limit {
        let mut cut = output_limit;
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        let truncated = format!("{}\n[truncated {} bytes]\n", &buf[..cut], buf.len() - cut);
        return fs::write(path, truncated)
            .with_context(|| format!("write transcript log {}", path.display()));
    }

    fs::write(path, buf).with_context(|| format!("write transcript log {}", path.display()))
}
