//! Planloop configuration stored under `.planloop/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the config file relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = ".planloop/config.toml";

/// Planloop configuration (TOML).
///
/// Edited by humans. Missing fields take the defaults below; CLI flags
/// override whatever is loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlanloopConfig {
    /// Worker/review cycles allowed per task before the run stops.
    pub max_iterations_per_task: u32,

    /// Directory that bare plan names resolve against.
    pub plans_dir: PathBuf,

    /// Extension appended to bare plan names (without the dot).
    pub plan_extension: String,

    /// Directory holding the four prompt templates.
    pub prompts_dir: PathBuf,

    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent CLI executable.
    pub program: String,

    /// Extra arguments passed on every invocation.
    pub extra_args: Vec<String>,

    pub worker_model: Option<String>,

    pub reviewer_model: Option<String>,

    /// Per-invocation wall-clock limit. Unset means wait for the agent indefinitely.
    pub timeout_secs: Option<u64>,

    /// Truncate captured agent stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// When set, per-invocation streams and logs are written here.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            extra_args: vec!["--dangerously-skip-permissions".to_string()],
            worker_model: None,
            reviewer_model: None,
            timeout_secs: None,
            output_limit_bytes: 4_000_000,
            transcript_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for PlanloopConfig {
    fn default() -> Self {
        Self {
            max_iterations_per_task: 5,
            plans_dir: PathBuf::from("plans"),
            plan_extension: "md".to_string(),
            prompts_dir: PathBuf::from(".planloop/prompts"),
            agent: AgentConfig::default(),
        }
    }
}

impl PlanloopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations_per_task == 0 {
            return Err(anyhow!("max_iterations_per_task must be > 0"));
        }
        if self.plan_extension.trim().is_empty() {
            return Err(anyhow!("plan_extension must not be empty"));
        }
        if self.agent.program.trim().is_empty() {
            return Err(anyhow!("agent.program must not be empty"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.agent.timeout_secs == Some(0) {
            return Err(anyhow!("agent.timeout_secs must be > 0 when set"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PlanloopConfig::default()`.
pub fn load_config(path: &Path) -> Result<PlanloopConfig> {
    if !path.exists() {
        let cfg = PlanloopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PlanloopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
