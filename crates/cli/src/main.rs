//! `flowctl` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a workflow DAG JSON file and print its execution order.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::{execution_order, ValidationError, WorkflowDag};
use serde::Serialize;
use tracing::{debug, info};

use crate::logging::LogLevel;

#[derive(Parser)]
#[command(name = "flowctl", about = "Workflow DAG tooling", version)]
struct Cli {
    /// Overrides FLOWCTL_LOG.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow DAG JSON file.
    Validate {
        /// Path to the workflow DAG JSON file.
        #[arg(env = "FLOWCTL_DAG")]
        path: PathBuf,
        /// Drop load operators first, as a preview run does.
        #[arg(long)]
        preview: bool,
        /// Print the execution order as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// One line of the execution plan.
#[derive(Debug, Serialize)]
struct PlannedOperator {
    position: usize,
    id: uuid::Uuid,
    name: String,
    kind: &'static str,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init_logging(cli.log_level) {
        eprintln!("flowctl error: {err:?}");
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("flowctl error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Validate { path, preview, json } => {
            let dag = load_dag(&path)?;

            match plan(&dag, preview) {
                Ok(planned) => {
                    info!(workflow = %dag.metadata.name, operators = planned.len(), "workflow is valid");
                    if json {
                        println!("{}", serde_json::to_string_pretty(&planned)?);
                    } else {
                        println!("Workflow '{}' is valid. Execution order:", dag.metadata.name);
                        for op in &planned {
                            println!("{:>4}. {} ({}) {}", op.position, op.name, op.kind, op.id);
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("Validation failed: {e}");
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}

fn load_dag(path: &Path) -> Result<WorkflowDag> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let dag: WorkflowDag = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a workflow DAG", path.display()))?;
    debug!(
        operators = dag.operators.len(),
        artifacts = dag.artifacts.len(),
        "loaded workflow"
    );
    Ok(dag)
}

fn plan(dag: &WorkflowDag, preview: bool) -> Result<Vec<PlannedOperator>, ValidationError> {
    let stripped;
    let dag = if preview {
        stripped = dag.without_load_operators();
        &stripped
    } else {
        dag
    };

    let order = execution_order(dag)?;
    Ok(order
        .iter()
        .filter_map(|id| dag.operators.get(id))
        .enumerate()
        .map(|(i, op)| PlannedOperator {
            position: i + 1,
            id: op.id,
            name: op.name.clone(),
            kind: op.spec.kind(),
        })
        .collect())
}
