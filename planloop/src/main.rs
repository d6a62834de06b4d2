//! Plan execution controller CLI.
//!
//! Runs a worker and a reviewer agent over the `## TODO` checklist of a plan
//! document until every task is approved, a task is blocked, or a task runs
//! out of iterations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use planloop::controller::TaskIterationController;
use planloop::driver::{DriverEvent, run_plan};
use planloop::exit_codes;
use planloop::io::config::{DEFAULT_CONFIG_PATH, PlanloopConfig, load_config};
use planloop::io::document::{PlanDocument, resolve_document_path};
use planloop::io::prompt::PromptTemplates;
use planloop::io::session::ClaudeCliClient;
use planloop::logging;
use planloop::report;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "planloop",
    version,
    about = "Drive worker and reviewer agents through a plan document's TODO list"
)]
struct Cli {
    /// Plan document path, or a bare name resolved as `<plans_dir>/<name>.md`.
    plan: String,

    /// Model for the worker agent.
    #[arg(long, value_name = "ID")]
    worker_model: Option<String>,

    /// Model for the reviewer agent.
    #[arg(long, value_name = "ID")]
    reviewer_model: Option<String>,

    /// Work/review cycles allowed per task.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_iterations: Option<u32>,

    /// Config file (default `.planloop/config.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the prompt templates.
    #[arg(long, value_name = "DIR")]
    prompts_dir: Option<PathBuf>,

    /// Write agent transcripts under this directory.
    #[arg(long, value_name = "DIR")]
    transcripts: Option<PathBuf>,

    /// Print the task list and exit without running any agent.
    #[arg(long)]
    status: bool,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let cfg = load_settings(cli)?;
    debug!(?cfg, "resolved settings");

    let path = resolve_document_path(&cli.plan, &cfg.plans_dir, &cfg.plan_extension);
    let document = PlanDocument::open(path)?;

    if cli.status {
        let snapshot = document.snapshot()?;
        println!("{}", report::render_status(document.path(), &snapshot)?);
        return Ok(exit_codes::OK);
    }

    let templates = PromptTemplates::load(&cfg.prompts_dir)?;
    let workdir = std::env::current_dir().context("resolve working directory")?;
    let client = ClaudeCliClient::new(workdir, cfg.agent.clone());
    let controller = TaskIterationController::new(
        &client,
        &document,
        &templates,
        cfg.max_iterations_per_task,
    );

    let outcome = match run_plan(&controller, print_progress) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {:#}", anyhow::Error::from(err));
            if let Ok(snapshot) = document.snapshot() {
                eprintln!("{}", report::format_tally(&snapshot.tally()));
            }
            return Ok(exit_codes::FATAL);
        }
    };

    println!("{}", report::render_summary(document.path(), &outcome)?);
    Ok(exit_codes::for_stop(&outcome.stop))
}

/// Load the config file and apply CLI overrides on top.
fn load_settings(cli: &Cli) -> Result<PlanloopConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            load_config(path)?
        }
        None => load_config(Path::new(DEFAULT_CONFIG_PATH))?,
    };
    apply_overrides(cli, &mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

fn apply_overrides(cli: &Cli, cfg: &mut PlanloopConfig) {
    if let Some(n) = cli.max_iterations {
        cfg.max_iterations_per_task = n;
    }
    if let Some(dir) = &cli.prompts_dir {
        cfg.prompts_dir = dir.clone();
    }
    if let Some(model) = &cli.worker_model {
        cfg.agent.worker_model = Some(model.clone());
    }
    if let Some(model) = &cli.reviewer_model {
        cfg.agent.reviewer_model = Some(model.clone());
    }
    if let Some(dir) = &cli.transcripts {
        cfg.agent.transcript_dir = Some(dir.clone());
    }
}

fn print_progress(event: &DriverEvent) {
    match event {
        DriverEvent::TaskStarted { index, text } => {
            println!("[task {}] {}", index + 1, text);
        }
        DriverEvent::TaskFinished { index, outcome, .. } => {
            println!(
                "[task {}] {}",
                index + 1,
                report::describe_task_outcome(outcome)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_only() {
        let cli = Cli::parse_from(["planloop", "auth-rewrite"]);
        assert_eq!(cli.plan, "auth-rewrite");
        assert!(cli.max_iterations.is_none());
        assert!(!cli.status);
    }

    #[test]
    fn parse_all_flags() {
        let cli = Cli::parse_from([
            "planloop",
            "plans/x.md",
            "--worker-model",
            "opus",
            "--reviewer-model",
            "sonnet",
            "--max-iterations",
            "3",
            "--prompts-dir",
            "prompts",
            "--transcripts",
            "out",
            "--status",
        ]);
        assert_eq!(cli.worker_model.as_deref(), Some("opus"));
        assert_eq!(cli.reviewer_model.as_deref(), Some("sonnet"));
        assert_eq!(cli.max_iterations, Some(3));
        assert_eq!(cli.prompts_dir, Some(PathBuf::from("prompts")));
        assert_eq!(cli.transcripts, Some(PathBuf::from("out")));
        assert!(cli.status);
    }

    #[test]
    fn rejects_zero_iterations() {
        assert!(Cli::try_parse_from(["planloop", "x", "--max-iterations", "0"]).is_err());
    }

    #[test]
    fn requires_plan_argument() {
        assert!(Cli::try_parse_from(["planloop"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "planloop",
            "x",
            "--max-iterations",
            "2",
            "--worker-model",
            "w",
        ]);
        let mut cfg = PlanloopConfig {
            max_iterations_per_task: 9,
            ..PlanloopConfig::default()
        };
        cfg.agent.reviewer_model = Some("from-config".to_string());
        apply_overrides(&cli, &mut cfg);
        assert_eq!(cfg.max_iterations_per_task, 2);
        assert_eq!(cfg.agent.worker_model.as_deref(), Some("w"));
        assert_eq!(cfg.agent.reviewer_model.as_deref(), Some("from-config"));
        assert_eq!(cfg.prompts_dir, PathBuf::from(".planloop/prompts"));
    }

    #[test]
    fn explicit_missing_config_is_fatal() {
        let cli = Cli::parse_from(["planloop", "x", "--config", "/nonexistent/planloop.toml"]);
        let err = load_settings(&cli).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
