//! Shared deterministic types for plan state.
//!
//! A [`PlanSnapshot`] is the complete, immutable parse result of the plan
//! document at one point in time. Nothing in here is ever patched in place:
//! callers re-parse the document and get a new snapshot.

use serde::Serialize;

/// One checklist item from the task section.
///
/// Identity is the task's position within the section, so an index is only
/// meaningful against the snapshot it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub text: String,
    pub done: bool,
    pub blocked: bool,
    /// A line attributed to this task carried the review feedback marker.
    pub has_review_feedback: bool,
}

impl Task {
    pub fn pending(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
            blocked: false,
            has_review_feedback: false,
        }
    }

    pub fn is_eligible(&self) -> bool {
        !self.done && !self.blocked
    }

    /// Checkbox marker as written in the document.
    pub fn marker(&self) -> &'static str {
        if self.done {
            "[x]"
        } else if self.blocked {
            "[B]"
        } else {
            "[ ]"
        }
    }
}

/// Parsed view of the plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSnapshot {
    pub tasks: Vec<Task>,
    pub all_done: bool,
    pub has_blocked: bool,
    pub next_eligible_index: Option<usize>,
}

impl PlanSnapshot {
    /// Build a snapshot, deriving the summary fields from `tasks`.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        // An empty task list is never "all done".
        let all_done = !tasks.is_empty() && tasks.iter().all(|task| task.done);
        let has_blocked = tasks.iter().any(|task| task.blocked);
        let next_eligible_index = tasks.iter().position(Task::is_eligible);
        Self {
            tasks,
            all_done,
            has_blocked,
            next_eligible_index,
        }
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// First blocked task, if any, with its index.
    pub fn first_blocked(&self) -> Option<(usize, &Task)> {
        self.tasks.iter().enumerate().find(|(_, task)| task.blocked)
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for task in &self.tasks {
            if task.done {
                tally.done += 1;
            } else if task.blocked {
                tally.blocked += 1;
            } else {
                tally.pending += 1;
            }
        }
        tally
    }
}

/// Task counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub done: usize,
    pub pending: usize,
    pub blocked: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.done + self.pending + self.blocked
    }
}
