//! nbmend - notebook validation and self-healing repair CLI
//!
//! ## Commands
//!
//! - `validate`: check JSON, `cells` structure, and Python syntax of every
//!   code cell. Read-only.
//! - `repair`: validate against the nbformat v4 schema and, on failure, ask
//!   Gemini for a corrected document, rewriting the file until it passes or
//!   the attempt budget runs out.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

use nbmend_core::report::{
    render_failure, render_load_error, render_report, render_structure_error, render_success,
};
use nbmend_core::{
    check_cells, execute_repair_loop, init_tracing, validate_notebook, AttemptOutcome,
    CycleEvent, GeminiAgent, GeminiConfig, RepairPolicy, ValidateError, DEFAULT_GEMINI_MODEL,
    DEFAULT_MAX_RETRIES,
};

const DEFAULT_NOTEBOOK: &str = "notebook.ipynb";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Parser)]
#[command(name = "nbmend")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate Jupyter notebooks and repair broken structure", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check notebook JSON, structure, and Python syntax of code cells
    Validate {
        /// Notebook file to check
        notebook_file: PathBuf,
    },

    /// Repair a notebook that fails nbformat validation using Gemini
    Repair {
        /// Notebook file to repair in place
        #[arg(default_value = DEFAULT_NOTEBOOK)]
        notebook: PathBuf,

        /// Gemini model identifier
        #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
        model: String,

        /// Maximum number of validation cycles
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..))]
        max_retries: u32,

        #[arg(long, env = API_KEY_ENV, hide = true, hide_env_values = true)]
        api_key: Option<String>,
    },
}

/// Settings for one repair run, fixed at startup.
#[derive(Debug, Clone)]
struct RepairConfig {
    notebook: PathBuf,
    model: String,
    policy: RepairPolicy,
    api_key: String,
}

impl RepairConfig {
    fn new(
        notebook: PathBuf,
        model: String,
        max_retries: u32,
        api_key: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("{API_KEY_ENV} environment variable is not set"))?;

        Ok(Self {
            notebook,
            model,
            policy: RepairPolicy {
                max_retries,
                ..RepairPolicy::default()
            },
            api_key,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Validate { notebook_file } => Ok(cmd_validate(&notebook_file)),
        Commands::Repair {
            notebook,
            model,
            max_retries,
            api_key,
        } => match RepairConfig::new(notebook, model, max_retries, api_key) {
            Ok(config) => cmd_repair(&config).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Pure validation. Returns whether the notebook passed.
fn cmd_validate(path: &Path) -> bool {
    let passed = match validate_notebook(path) {
        Ok(report) => {
            for block in render_report(path, &report) {
                println!("{block}");
            }
            report.is_valid()
        }
        Err(ValidateError::Load(e)) => {
            println!("{}", render_load_error(path, &e));
            false
        }
        Err(ValidateError::Structure(e)) => {
            println!("{}", render_structure_error(path, &e));
            false
        }
    };

    if passed {
        println!("{}", render_success(path));
    } else {
        println!("{}", render_failure(path));
    }
    passed
}

/// Self-healing repair. Returns whether the notebook ended up valid.
async fn cmd_repair(config: &RepairConfig) -> Result<bool> {
    let agent = GeminiAgent::new(GeminiConfig::new(&config.api_key, &config.model))
        .context("Failed to create Gemini client")?;
    let path = config.notebook.as_path();
    let max = config.policy.max_retries;

    let log = execute_repair_loop(path, &agent, &config.policy, |event| {
        print_cycle(path, max, agent.model(), event)
    })
    .await
    .with_context(|| format!("Repair of {} aborted", path.display()))?;

    debug!(run_id = %log.run_id, agent_calls = log.agent_calls(), "repair run complete");

    if !log.recovered() {
        println!(
            "Failed to repair {} after {} attempts.",
            path.display(),
            log.cycles_used
        );
        return Ok(false);
    }

    println!("Successfully validated {}.", path.display());

    if let Some(notebook) = &log.notebook {
        let report = check_cells(notebook);
        if !report.is_valid() {
            println!(
                "Warning: {} code cell(s) still contain Python syntax errors:",
                report.diagnostics.len()
            );
            for block in render_report(path, &report) {
                println!("{block}");
            }
        }
    }
    Ok(true)
}

fn print_cycle(path: &Path, max: u32, model: &str, event: CycleEvent<'_>) {
    match event {
        CycleEvent::Valid { attempt } => {
            println!("Attempt {attempt}/{max}: {} is valid.", path.display())
        }
        CycleEvent::Invalid { attempt, error } => println!(
            "Attempt {attempt}/{max}: {} failed validation ({}): {}",
            path.display(),
            error.kind(),
            error.message()
        ),
        CycleEvent::Repairing { .. } => println!("Attempting fix with {model}..."),
        CycleEvent::Persisted { .. } => println!("Wrote proposed fix to {}.", path.display()),
        CycleEvent::Skipped { outcome, .. } => match outcome {
            AttemptOutcome::AgentError => println!("Repair agent call failed; will retry."),
            _ => println!("Proposed fix is not valid JSON; file left unchanged."),
        },
        CycleEvent::Exhausted { attempts } => {
            println!("Giving up after {attempts} attempts.")
        }
    }
}
