//! Human-facing run summaries and plan status.
//!
//! This is product output printed to stdout, separate from `tracing` diagnostics.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::controller::{BlockReason, TaskOutcome};
use crate::core::types::{PlanSnapshot, Tally};
use crate::driver::{RunOutcome, RunStop};

const SUMMARY_TEMPLATE: &str = include_str!("templates/summary.txt");
const STATUS_TEMPLATE: &str = include_str!("templates/status.txt");

/// Template engine wrapper around minijinja.
struct ReportEngine {
    env: Environment<'static>,
}

impl ReportEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("summary", SUMMARY_TEMPLATE)
            .context("load summary template")?;
        env.add_template("status", STATUS_TEMPLATE)
            .context("load status template")?;
        Ok(Self { env })
    }
}

/// One task row for the status listing.
#[derive(Debug, Serialize)]
struct TaskLine<'a> {
    number: usize,
    marker: &'static str,
    text: &'a str,
    feedback: bool,
    next: bool,
}

/// One-line description of why a run stopped. Task numbers are 1-based.
pub fn describe_stop(stop: &RunStop) -> String {
    match stop {
        RunStop::Complete => "plan complete".to_string(),
        RunStop::NoEligibleTasks => "no eligible tasks in the plan".to_string(),
        RunStop::Blocked {
            index,
            text,
            reason,
        } => {
            let task = format!("task {} \"{}\"", index + 1, text);
            match reason {
                BlockReason::BlockedTask {
                    index: blocked_index,
                    text: blocked_text,
                } if blocked_index != index => format!(
                    "stopped at {task}: task {} \"{}\" is blocked",
                    blocked_index + 1,
                    blocked_text
                ),
                BlockReason::BlockedTask { .. } => format!("{task} is blocked"),
                BlockReason::WorkerIncomplete => {
                    format!("blocked at {task}: worker finished without checking it off")
                }
                BlockReason::TaskMissing => {
                    format!("blocked at {task}: task disappeared from the document")
                }
            }
        }
        RunStop::MaxIterations {
            index,
            text,
            iterations,
        } => format!(
            "task {} \"{}\" not approved after {} iteration(s)",
            index + 1,
            text,
            iterations
        ),
    }
}

/// Short description of a finished task, for progress lines.
pub fn describe_task_outcome(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Approved { iterations } => {
            format!("approved after {iterations} iteration(s)")
        }
        TaskOutcome::Blocked { iteration, .. } => format!("blocked in iteration {iteration}"),
        TaskOutcome::MaxIterations { iterations } => {
            format!("iteration budget of {iterations} exhausted")
        }
    }
}

fn hint(stop: &RunStop) -> Option<&'static str> {
    match stop {
        RunStop::Complete | RunStop::NoEligibleTasks => None,
        RunStop::Blocked { .. } => Some("resolve the blocked task in the document, then rerun"),
        RunStop::MaxIterations { .. } => Some("address the review feedback on the task, then rerun"),
    }
}

/// Render the end-of-run summary.
pub fn render_summary(plan: &Path, outcome: &RunOutcome) -> Result<String> {
    let engine = ReportEngine::new()?;
    let template = engine.env.get_template("summary")?;
    let rendered = template.render(context! {
        plan => plan.display().to_string(),
        headline => describe_stop(&outcome.stop),
        approved => outcome.tasks_approved,
        tally => outcome.tally,
        hint => hint(&outcome.stop),
    })?;
    Ok(rendered.trim_end_matches('\n').to_string())
}

/// Render the task list with markers, for `--status`.
pub fn render_status(plan: &Path, snapshot: &PlanSnapshot) -> Result<String> {
    let engine = ReportEngine::new()?;
    let tasks: Vec<TaskLine<'_>> = snapshot
        .tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| TaskLine {
            number: idx + 1,
            marker: task.marker(),
            text: &task.text,
            feedback: task.has_review_feedback,
            next: snapshot.next_eligible_index == Some(idx),
        })
        .collect();
    let template = engine.env.get_template("status")?;
    let rendered = template.render(context! {
        plan => plan.display().to_string(),
        tasks => tasks,
        tally => snapshot.tally(),
    })?;
    Ok(rendered.trim_end_matches('\n').to_string())
}

/// Tally line used when a run ends with a fatal error.
pub fn format_tally(tally: &Tally) -> String {
    format!(
        "tasks: {} done, {} pending, {} blocked",
        tally.done, tally.pending, tally.blocked
    )
}
