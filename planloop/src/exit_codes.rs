//! Stable exit codes for the planloop CLI.

use crate::driver::RunStop;

/// Plan complete, or nothing eligible to run.
pub const OK: i32 = 0;
/// Fatal error: missing document or template, bad config, agent session failure.
pub const FATAL: i32 = 1;
/// Invalid command line (clap's own exit code).
pub const USAGE: i32 = 2;
/// The run stopped on a blocked task.
pub const BLOCKED: i32 = 3;
/// A task used its whole iteration budget without approval.
pub const EXHAUSTED: i32 = 4;

/// Exit code for a run that ended without a fatal error.
pub fn for_stop(stop: &RunStop) -> i32 {
    match stop {
        RunStop::Complete | RunStop::NoEligibleTasks => OK,
        RunStop::Blocked { .. } => BLOCKED,
        RunStop::MaxIterations { .. } => EXHAUSTED,
    }
}
