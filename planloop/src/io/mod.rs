//! I/O helpers: config, the plan document, prompt templates, agent processes.

pub mod config;
pub mod document;
pub mod process;
pub mod prompt;
pub mod session;
