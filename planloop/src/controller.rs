//! Worker/reviewer cycle for a single task.
//!
//! The controller keeps no mirror of task progress. Every decision is taken
//! against a fresh parse of the plan document, and agent output is never read
//! as state.

use tracing::{debug, info, instrument, warn};

use crate::core::types::PlanSnapshot;
use crate::error::{PlanError, SessionStage};
use crate::io::document::PlanDocument;
use crate::io::prompt::{PromptKind, PromptTemplates};
use crate::io::session::{AgentClient, Role, SessionHandle, run_to_completion};

/// Why a task stopped in the blocked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// A task in the document is marked `[B]`.
    BlockedTask { index: usize, text: String },
    /// The worker turn ended without the task being checked off.
    WorkerIncomplete,
    /// The document no longer has a task at the target index.
    TaskMissing,
}

/// Terminal result of processing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The reviewer left the task checked.
    Approved { iterations: u32 },
    Blocked { iteration: u32, reason: BlockReason },
    /// Every iteration ended with the reviewer requesting changes.
    MaxIterations { iterations: u32 },
}

/// Counters for one task's processing window.
#[derive(Debug, Default)]
struct IterationState {
    iteration: u32,
    worker_ran: bool,
    reviewer_ran: bool,
}

/// Sessions for one task's processing window. Created on first use.
#[derive(Debug, Default)]
struct TaskSessions {
    worker: Option<SessionHandle>,
    reviewer: Option<SessionHandle>,
}

impl TaskSessions {
    fn slot(&mut self, role: Role) -> &mut Option<SessionHandle> {
        match role {
            Role::Worker => &mut self.worker,
            Role::Reviewer => &mut self.reviewer,
        }
    }
}

/// Drives one task through worker and review turns until a terminal outcome.
pub struct TaskIterationController<'a, C: AgentClient + ?Sized> {
    client: &'a C,
    document: &'a PlanDocument,
    templates: &'a PromptTemplates,
    max_iterations: u32,
}

impl<'a, C: AgentClient + ?Sized> TaskIterationController<'a, C> {
    pub fn new(
        client: &'a C,
        document: &'a PlanDocument,
        templates: &'a PromptTemplates,
        max_iterations: u32,
    ) -> Self {
        Self {
            client,
            document,
            templates,
            max_iterations,
        }
    }

    pub fn document(&self) -> &PlanDocument {
        self.document
    }

    /// Process the task at `index` to a terminal outcome.
    ///
    /// Sessions live only for this call; the next task starts with new ones.
    #[instrument(skip(self), fields(max_iterations = self.max_iterations))]
    pub fn run_task(&self, index: usize) -> Result<TaskOutcome, PlanError> {
        let mut state = IterationState::default();
        let mut sessions = TaskSessions::default();

        while state.iteration < self.max_iterations {
            state.iteration += 1;
            let iteration = state.iteration;

            let snapshot = self.document.snapshot()?;
            if let Some(reason) = blocked_reason(&snapshot) {
                return Ok(self.blocked(iteration, reason));
            }
            let Some(task) = snapshot.task(index) else {
                return Ok(self.blocked(iteration, BlockReason::TaskMissing));
            };

            if !task.done {
                self.take_turn(&mut sessions, Role::Worker, state.worker_ran)?;
                state.worker_ran = true;

                let snapshot = self.document.snapshot()?;
                if let Some(reason) = blocked_reason(&snapshot) {
                    return Ok(self.blocked(iteration, reason));
                }
                match snapshot.task(index) {
                    None => return Ok(self.blocked(iteration, BlockReason::TaskMissing)),
                    Some(task) if !task.done => {
                        return Ok(self.blocked(iteration, BlockReason::WorkerIncomplete));
                    }
                    Some(_) => {}
                }
            } else {
                debug!(iteration, "task already checked, going straight to review");
            }

            self.take_turn(&mut sessions, Role::Reviewer, state.reviewer_ran)?;
            state.reviewer_ran = true;

            let snapshot = self.document.snapshot()?;
            let Some(task) = snapshot.task(index) else {
                return Ok(self.blocked(iteration, BlockReason::TaskMissing));
            };
            if task.done {
                info!(iteration, "task approved");
                return Ok(TaskOutcome::Approved {
                    iterations: iteration,
                });
            }
            // A block raised by the reviewer belongs to this iteration.
            if let Some(reason) = blocked_reason(&snapshot) {
                return Ok(self.blocked(iteration, reason));
            }
            info!(
                iteration,
                feedback = task.has_review_feedback,
                "reviewer requested changes"
            );
        }

        warn!(iterations = self.max_iterations, "iteration budget exhausted");
        Ok(TaskOutcome::MaxIterations {
            iterations: self.max_iterations,
        })
    }

    fn blocked(&self, iteration: u32, reason: BlockReason) -> TaskOutcome {
        warn!(iteration, ?reason, "task blocked");
        TaskOutcome::Blocked { iteration, reason }
    }

    /// Run one role's turn, opening its session on first use.
    fn take_turn(
        &self,
        sessions: &mut TaskSessions,
        role: Role,
        resume: bool,
    ) -> Result<(), PlanError> {
        let slot = sessions.slot(role);
        let mut session = match slot.take() {
            Some(session) => session,
            None => self
                .client
                .create_session(role)
                .map_err(|err| PlanError::agent_session(role, SessionStage::Create, &err))?,
        };

        let kind = PromptKind::for_turn(role, resume);
        let prompt = self.templates.render(kind, self.document.path());
        info!(%role, ?kind, session_id = session.id(), "running agent turn");
        let result = run_to_completion(self.client, &mut session, &prompt);
        *slot = Some(session);
        result.map_err(|err| PlanError::agent_session(role, SessionStage::Run, &err))?;
        Ok(())
    }
}

fn blocked_reason(snapshot: &PlanSnapshot) -> Option<BlockReason> {
    snapshot
        .first_blocked()
        .map(|(index, task)| BlockReason::BlockedTask {
            index,
            text: task.text.clone(),
        })
}
