//! Test-only helpers: a scripted agent client and a throwaway workspace.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::io::document::PlanDocument;
use crate::io::prompt::{PromptKind, PromptTemplates};
use crate::io::session::{AgentClient, Role, SessionHandle};

/// One scripted agent turn.
///
/// When `document` is set, the client overwrites the plan document with it,
/// standing in for the edits a real agent makes.
#[derive(Debug, Clone)]
pub struct ScriptedTurn {
    pub role: Role,
    pub document: Option<String>,
    pub failure: Option<String>,
}

impl ScriptedTurn {
    pub fn worker(document: Option<&str>) -> Self {
        Self {
            role: Role::Worker,
            document: document.map(str::to_string),
            failure: None,
        }
    }

    pub fn reviewer(document: Option<&str>) -> Self {
        Self {
            role: Role::Reviewer,
            document: document.map(str::to_string),
            failure: None,
        }
    }

    pub fn worker_fails(message: &str) -> Self {
        Self {
            role: Role::Worker,
            document: None,
            failure: Some(message.to_string()),
        }
    }
}

/// A call observed by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub role: Role,
    pub session_id: String,
    /// Completed turns on the session before this call.
    pub turn: u32,
    pub prompt: String,
}

/// Agent client that replays scripted turns in order.
pub struct ScriptedClient {
    document_path: PathBuf,
    turns: RefCell<VecDeque<ScriptedTurn>>,
    created: RefCell<Vec<Role>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new(document_path: impl Into<PathBuf>, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            document_path: document_path.into(),
            turns: RefCell::new(turns.into()),
            created: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Roles of sessions created so far, in order.
    pub fn created(&self) -> Vec<Role> {
        self.created.borrow().clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Scripted turns not yet consumed.
    pub fn remaining(&self) -> usize {
        self.turns.borrow().len()
    }
}

impl AgentClient for ScriptedClient {
    fn create_session(&self, role: Role) -> Result<SessionHandle> {
        let mut created = self.created.borrow_mut();
        created.push(role);
        Ok(SessionHandle::new(role, format!("{role}-{}", created.len())))
    }

    fn run(&self, session: &SessionHandle, prompt: &str) -> Result<String> {
        let turn = self
            .turns
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted turn left for {}", session.role()))?;
        if turn.role != session.role() {
            bail!(
                "scripted turn expected {} but {} ran",
                turn.role,
                session.role()
            );
        }
        self.calls.borrow_mut().push(RecordedCall {
            role: session.role(),
            session_id: session.id().to_string(),
            turn: session.turns(),
            prompt: prompt.to_string(),
        });
        if let Some(message) = turn.failure {
            bail!("{message}");
        }
        if let Some(document) = turn.document {
            fs::write(&self.document_path, document)
                .with_context(|| format!("write {}", self.document_path.display()))?;
        }
        Ok(format!("{} turn complete", session.role()))
    }
}

/// Temporary project with a plan document and prompt templates.
///
/// Templates render as `<KIND> <document path>`, e.g. `WORK-RESUME /tmp/x/plans/plan.md`.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new(plan: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let ws = Self { dir };
        fs::create_dir_all(ws.plans_dir()).context("create plans dir")?;
        fs::write(ws.plan_path(), plan).context("write plan")?;
        fs::create_dir_all(ws.prompts_dir()).context("create prompts dir")?;
        for kind in PromptKind::ALL {
            let label = kind.file_name().trim_end_matches(".md").to_uppercase();
            fs::write(
                ws.prompts_dir().join(kind.file_name()),
                format!("{label} $ARGUMENTS"),
            )
            .context("write template")?;
        }
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.root().join("plans")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.root().join(".planloop").join("prompts")
    }

    pub fn plan_path(&self) -> PathBuf {
        self.plans_dir().join("plan.md")
    }

    pub fn read_plan(&self) -> Result<String> {
        fs::read_to_string(self.plan_path()).context("read plan")
    }

    /// Open the plan document and load the templates.
    pub fn open(&self) -> Result<(PlanDocument, PromptTemplates)> {
        let doc = PlanDocument::open(self.plan_path())?;
        let templates = PromptTemplates::load(&self.prompts_dir())?;
        Ok((doc, templates))
    }
}
