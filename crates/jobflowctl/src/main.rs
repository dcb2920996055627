//! Jobflow command line tool.
//!
//! Validates job files and dry-runs them locally with step outcomes scripted
//! through step properties.

mod artifacts;
mod loader;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobflow_engine::{
    BatchStatus, EngineConfig, InMemoryJobRepository, JobEngine, JobExecution, ScriptedStepRunner,
};

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(version, about = "Jobflow batch job tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job file with the scripted step runner
    ///
    /// Step properties drive each step:
    ///   outcome:     completed | failed | stopped
    ///   exit_status: exit status to report
    ///   sleep_ms:    simulated work
    ///
    /// Examples:
    ///     jobflow run ./jobs/nightly.yaml
    ///     jobflow run ./jobs/nightly.yaml -p run.date=2026-01-31
    ///     jobflow run ./jobs/nightly.yaml --restart-from load
    #[command(verbatim_doc_comment)]
    Run {
        /// Job file (YAML or JSON)
        file: PathBuf,

        /// Job-level element to start from
        #[arg(long, value_name = "ID")]
        restart_from: Option<String>,

        /// Job parameter (format: key=value), can be repeated
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Print the final execution record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a job file's structure without running it
    Validate {
        /// Job file (YAML or JSON)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobflow_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            restart_from,
            params,
            json,
        } => run(file, restart_from, params, json).await,
        Commands::Validate { file } => validate(file),
    }
}

fn validate(file: PathBuf) -> Result<()> {
    let job = loader::load_job(&file)?;
    job.validate()?;
    println!("Job '{}' is valid ({} elements)", job.id, job.elements.len());
    Ok(())
}

async fn run(file: PathBuf, restart_from: Option<String>, params: Vec<String>, json: bool) -> Result<()> {
    let job = loader::load_job(&file)?;
    job.validate()?;
    let parameters = loader::parse_parameters(&params)?;

    let config = EngineConfig::from_env()?;
    tracing::info!(
        split_timeout_ms = config.split_timeout_ms,
        split_timeout_policy = ?config.split_timeout_policy,
        max_concurrent_steps = config.max_concurrent_steps,
        "Engine configuration loaded"
    );

    let engine = JobEngine::builder()
        .step_runner(Arc::new(ScriptedStepRunner::new()))
        .artifacts(Arc::new(artifacts::builtin_registry()))
        .repository(Arc::new(InMemoryJobRepository::new()))
        .config(config)
        .build();

    let execution = Arc::new(JobExecution::new(job.id.clone(), parameters));
    if let Some(position) = restart_from {
        if job.element(&position).is_none() {
            anyhow::bail!("Job '{}' has no job-level element '{}'", job.id, position);
        }
        execution.set_restart_position(Some(position));
    }

    let stopper = {
        let execution = execution.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Stop requested, waiting for running steps");
                execution.request_stop();
            }
        })
    };

    let status = engine.run(&job, execution.clone()).await;
    stopper.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&execution.snapshot())?);
    } else {
        println!("Execution: {}", execution.id());
        println!("Status:    {}", status);
        println!(
            "Exit:      {}",
            execution.exit_status().unwrap_or_default()
        );
        for step in execution.step_executions() {
            println!("  {:<24} {:<10} {}", step.step_id, step.status, step.exit_status);
        }
        if let Some(position) = execution.restart_position() {
            println!("Restart:   jobflow run {} --restart-from {}", file.display(), position);
        }
    }

    match status {
        BatchStatus::Completed => Ok(()),
        other => anyhow::bail!("Job '{}' finished {}", execution.job_name(), other),
    }
}
