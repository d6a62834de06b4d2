//! Fatal error kinds surfaced to the top level.
//!
//! Expected terminal outcomes (approved, blocked, exhausted) are not errors;
//! see [`crate::controller::TaskOutcome`] and [`crate::driver::RunStop`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::io::session::Role;

/// Point at which an agent session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Create,
    Run,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStage::Create => f.write_str("create"),
            SessionStage::Run => f.write_str("run"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan document not found: {}", path.display())]
    DocumentNotFound { path: PathBuf },

    #[error("read plan document {}: {source}", path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("read prompt template {}: {source}", path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{role} session failed to {stage}: {cause}")]
    AgentSession {
        role: Role,
        stage: SessionStage,
        cause: String,
    },
}

impl PlanError {
    /// Wrap a client failure, keeping the full context chain in the message.
    pub fn agent_session(role: Role, stage: SessionStage, err: &anyhow::Error) -> Self {
        PlanError::AgentSession {
            role,
            stage,
            cause: format!("{err:#}"),
        }
    }
}
