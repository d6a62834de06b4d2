//! Outer plan loop.
//!
//! Picks the first eligible task from a fresh parse, hands it to the
//! [`TaskIterationController`], and repeats until the plan is complete, blocked,
//! or a task runs out of iterations.

use tracing::{info, instrument};

use crate::controller::{BlockReason, TaskIterationController, TaskOutcome};
use crate::core::types::Tally;
use crate::error::PlanError;
use crate::io::session::AgentClient;

/// Reason why `run_plan` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStop {
    /// Every task is checked off.
    Complete,
    /// Nothing left to pick, but the plan is not complete (e.g. no tasks at all).
    NoEligibleTasks,
    /// Stopped on a blocked task. `index`/`text` name the task being worked on,
    /// or the blocked task itself when the run halted before picking one.
    Blocked {
        index: usize,
        text: String,
        reason: BlockReason,
    },
    /// The task at `index` used all its iterations without approval.
    MaxIterations {
        index: usize,
        text: String,
        iterations: u32,
    },
}

impl RunStop {
    /// True when the run ended without needing a human.
    pub fn is_success(&self) -> bool {
        matches!(self, RunStop::Complete | RunStop::NoEligibleTasks)
    }
}

/// Progress notifications emitted while the plan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    TaskStarted {
        index: usize,
        text: String,
    },
    TaskFinished {
        index: usize,
        text: String,
        outcome: TaskOutcome,
    },
}

/// Summary of a plan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stop: RunStop,
    pub tasks_approved: u32,
    /// Counts from a fresh parse taken after the run stopped.
    pub tally: Tally,
}

/// Run tasks until the plan completes, blocks, or a task exhausts its budget.
///
/// Stops immediately on any fatal error (document, template, agent session).
#[instrument(skip_all, fields(document = %controller.document().path().display()))]
pub fn run_plan<C, F>(
    controller: &TaskIterationController<'_, C>,
    mut on_event: F,
) -> Result<RunOutcome, PlanError>
where
    C: AgentClient + ?Sized,
    F: FnMut(&DriverEvent),
{
    let document = controller.document();
    let mut tasks_approved = 0u32;

    let stop = loop {
        // Always re-select from the document; earlier indices mean nothing once
        // the agents have edited it.
        let snapshot = document.snapshot()?;

        if let Some((index, task)) = snapshot.first_blocked() {
            break RunStop::Blocked {
                index,
                text: task.text.clone(),
                reason: BlockReason::BlockedTask {
                    index,
                    text: task.text.clone(),
                },
            };
        }

        let Some(index) = snapshot.next_eligible_index else {
            break if snapshot.all_done {
                RunStop::Complete
            } else {
                RunStop::NoEligibleTasks
            };
        };
        let text = snapshot.tasks[index].text.clone();

        info!(index, task = %text, "starting task");
        on_event(&DriverEvent::TaskStarted {
            index,
            text: text.clone(),
        });

        let outcome = controller.run_task(index)?;
        on_event(&DriverEvent::TaskFinished {
            index,
            text: text.clone(),
            outcome: outcome.clone(),
        });

        match outcome {
            TaskOutcome::Approved { .. } => tasks_approved += 1,
            TaskOutcome::Blocked { reason, .. } => {
                break RunStop::Blocked {
                    index,
                    text,
                    reason,
                };
            }
            TaskOutcome::MaxIterations { iterations } => {
                break RunStop::MaxIterations {
                    index,
                    text,
                    iterations,
                };
            }
        }
    };

    let tally = document.snapshot()?.tally();
    info!(?stop, tasks_approved, ?tally, "plan run finished");
    Ok(RunOutcome {
        stop,
        tasks_approved,
        tally,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::session::Role;
    use crate::test_support::{ScriptedClient, ScriptedTurn, TestWorkspace};

    #[test]
    fn blocked_plan_halts_before_any_session() {
        let ws = TestWorkspace::new("## TODO\n- [B] migrate schema\n").expect("workspace");
        let client = ScriptedClient::new(ws.plan_path(), Vec::new());
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let outcome = run_plan(&controller, |_| {}).expect("run");
        assert_eq!(
            outcome.stop,
            RunStop::Blocked {
                index: 0,
                text: "migrate schema".to_string(),
                reason: BlockReason::BlockedTask {
                    index: 0,
                    text: "migrate schema".to_string()
                }
            }
        );
        assert_eq!(outcome.tally.blocked, 1);
        assert!(client.created().is_empty());
    }

    #[test]
    fn blocked_task_later_in_plan_still_halts_first() {
        let ws = TestWorkspace::new("## TODO\n- [ ] a\n- [b] b\n").expect("workspace");
        let client = ScriptedClient::new(ws.plan_path(), Vec::new());
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let outcome = run_plan(&controller, |_| {}).expect("run");
        assert!(matches!(outcome.stop, RunStop::Blocked { index: 1, .. }));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn empty_plan_has_nothing_eligible() {
        let ws = TestWorkspace::new("# Plan\n\n## TODO\n\n").expect("workspace");
        let client = ScriptedClient::new(ws.plan_path(), Vec::new());
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let outcome = run_plan(&controller, |_| {}).expect("run");
        assert_eq!(outcome.stop, RunStop::NoEligibleTasks);
        assert!(outcome.stop.is_success());
        assert_eq!(outcome.tally.total(), 0);
    }

    #[test]
    fn completes_every_task_in_order() {
        let ws = TestWorkspace::new("## TODO\n- [ ] a\n- [ ] b\n").expect("workspace");
        let client = ScriptedClient::new(
            ws.plan_path(),
            vec![
                ScriptedTurn::worker(Some("## TODO\n- [x] a\n- [ ] b\n")),
                ScriptedTurn::reviewer(None),
                ScriptedTurn::worker(Some("## TODO\n- [x] a\n- [x] b\n")),
                ScriptedTurn::reviewer(None),
            ],
        );
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let mut events = Vec::new();
        let outcome = run_plan(&controller, |event| events.push(event.clone())).expect("run");
        assert_eq!(outcome.stop, RunStop::Complete);
        assert_eq!(outcome.tasks_approved, 2);
        assert_eq!(
            outcome.tally,
            Tally {
                done: 2,
                pending: 0,
                blocked: 0
            }
        );
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            DriverEvent::TaskStarted {
                index: 0,
                text: "a".to_string()
            }
        );
        // Each task gets its own pair of sessions.
        assert_eq!(
            client.created(),
            vec![Role::Worker, Role::Reviewer, Role::Worker, Role::Reviewer]
        );
    }

    #[test]
    fn max_iterations_stops_the_whole_run() {
        let changes = "## TODO\n- [ ] a\n  review: status=request_changes\n- [ ] b\n";
        let checked = "## TODO\n- [x] a\n- [ ] b\n";
        let ws = TestWorkspace::new("## TODO\n- [ ] a\n- [ ] b\n").expect("workspace");
        let client = ScriptedClient::new(
            ws.plan_path(),
            vec![
                ScriptedTurn::worker(Some(checked)),
                ScriptedTurn::reviewer(Some(changes)),
                ScriptedTurn::worker(Some(checked)),
                ScriptedTurn::reviewer(Some(changes)),
            ],
        );
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 2);

        let outcome = run_plan(&controller, |_| {}).expect("run");
        assert_eq!(
            outcome.stop,
            RunStop::MaxIterations {
                index: 0,
                text: "a".to_string(),
                iterations: 2
            }
        );
        assert!(!outcome.stop.is_success());
        assert_eq!(outcome.tasks_approved, 0);
        assert_eq!(client.remaining(), 0);
        assert_eq!(outcome.tally.pending, 2);
    }

    #[test]
    fn next_task_is_reselected_after_edits() {
        // The reviewer approves "a" and inserts a new task ahead of "b".
        let ws = TestWorkspace::new("## TODO\n- [ ] a\n- [ ] b\n").expect("workspace");
        let client = ScriptedClient::new(
            ws.plan_path(),
            vec![
                ScriptedTurn::worker(Some("## TODO\n- [x] a\n- [ ] b\n")),
                ScriptedTurn::reviewer(Some("## TODO\n- [x] a\n- [ ] a2\n- [ ] b\n")),
                ScriptedTurn::worker(Some("## TODO\n- [x] a\n- [x] a2\n- [ ] b\n")),
                ScriptedTurn::reviewer(None),
                ScriptedTurn::worker(Some("## TODO\n- [x] a\n- [x] a2\n- [x] b\n")),
                ScriptedTurn::reviewer(None),
            ],
        );
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let mut started = Vec::new();
        let outcome = run_plan(&controller, |event| {
            if let DriverEvent::TaskStarted { index, text } = event {
                started.push((*index, text.clone()));
            }
        })
        .expect("run");

        assert_eq!(outcome.stop, RunStop::Complete);
        assert_eq!(
            started,
            vec![
                (0, "a".to_string()),
                (1, "a2".to_string()),
                (2, "b".to_string())
            ]
        );
    }

    #[test]
    fn session_error_propagates() {
        let ws = TestWorkspace::new("## TODO\n- [ ] a\n").expect("workspace");
        let client = ScriptedClient::new(ws.plan_path(), vec![ScriptedTurn::worker_fails("down")]);
        let (doc, templates) = ws.open().expect("open");
        let controller = TaskIterationController::new(&client, &doc, &templates, 5);

        let err = run_plan(&controller, |_| {}).unwrap_err();
        assert!(matches!(err, PlanError::AgentSession { .. }));
    }
}
