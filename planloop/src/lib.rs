//! Plan execution controller.
//!
//! Drives a worker agent and a reviewer agent through the checklist in a
//! markdown plan document, one task at a time, until the plan is complete,
//! blocked, or a task runs out of iterations. The document is the only state:
//! every decision is made from a fresh parse of it.
//!
//! - **[`core`]**: Pure, deterministic parsing of the plan document.
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, agent processes).
//!   Isolated behind the [`io::session::AgentClient`] trait for tests.
//!
//! [`controller`] runs one task through work/review iterations; [`driver`]
//! repeats that across the plan; [`report`] renders what happened.

pub mod controller;
pub mod core;
pub mod driver;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
