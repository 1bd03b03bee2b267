//! Run command implementation
//!
//! Handles `relumen run INPUT_DIR OUTPUT_DIR INTERMEDIATE_DIR [MAX_PARALLEL]`.
//! Order: enumerate inputs, pre-flight checks, create the output layout,
//! then execute the batches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use relumen_config::{Config, LaunchMode};
use relumen_doctor::{RunDirectories, preflight};
use relumen_engine::{
    Batch, JobSet, LoggingObserver, NamingScheme, Scheduler, Worker, WorkerInvocation,
    enumerate_jobs, prepare_layout,
};
use relumen_runner::{NativeRunner, ProcessRunner};
use relumen_utils::error::RelumenError;
use relumen_utils::exit_codes::ExitCode;

/// Slack on top of both stage timeouts for a worker child process
const WORKER_PROCESS_OVERHEAD: Duration = Duration::from_secs(60);

/// Positional directories and output flags of `relumen run`
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub intermediate_dir: PathBuf,
    pub dry_run: bool,
    pub json: bool,
}

/// Batch plan printed by `--dry-run`
#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    max_parallel: usize,
    launch_mode: LaunchMode,
    total_jobs: usize,
    batches: &'a [Batch],
}

/// Execute the run command
pub async fn execute_run_command(request: &RunRequest, config: &Config) -> Result<ExitCode> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(NativeRunner::new());

    let jobs = enumerate_jobs(
        &request.input_dir,
        &request.intermediate_dir,
        &request.output_dir,
        &config.enumeration,
    )
    .map_err(RelumenError::from)?;
    debug!(jobs = jobs.len(), input_dir = %request.input_dir.display(), "Enumerated inputs");

    let scheduler = build_scheduler(config, Arc::clone(&runner))?;
    let plan = scheduler.plan(&jobs);

    if request.dry_run {
        print_plan(config, &jobs, &plan, request.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let directories = RunDirectories {
        input_dir: request.input_dir.clone(),
        output_dir: request.output_dir.clone(),
        intermediate_dir: request.intermediate_dir.clone(),
    };
    preflight(config, runner, directories).map_err(RelumenError::from)?;
    prepare_layout(&request.output_dir, &request.intermediate_dir).map_err(RelumenError::from)?;

    if jobs.is_empty() {
        info!("No input images found in {}", request.input_dir.display());
    }

    let mut observer = LoggingObserver::new(plan.len());
    let summary = scheduler.run(&jobs, &mut observer).await;

    if request.json {
        let json_output =
            serde_json::to_string_pretty(&summary).context("Failed to emit run summary JSON")?;
        println!("{json_output}");
    } else {
        print!("{}", summary.render_text());
    }

    Ok(summary.exit_code())
}

fn build_scheduler(config: &Config, runner: Arc<dyn ProcessRunner>) -> Result<Scheduler> {
    let max_parallel = config.run.max_parallel;
    match config.run.launch_mode {
        LaunchMode::InProcess => {
            let worker = Worker::new(
                runner,
                NamingScheme::from_config(&config.naming),
                config.commands.clone(),
            );
            Ok(Scheduler::in_process(worker, max_parallel))
        }
        LaunchMode::Subprocess => {
            let timeout = config.commands.decompose.timeout()
                + config.commands.process.timeout()
                + WORKER_PROCESS_OVERHEAD;
            let invocation = WorkerInvocation::current_exe(config.config_path.as_deref(), timeout)
                .map_err(|e| RelumenError::Runtime {
                    reason: format!("Cannot locate the relumen executable: {e}"),
                })?;
            Ok(Scheduler::subprocess(runner, invocation, max_parallel))
        }
    }
}

fn print_plan(config: &Config, jobs: &JobSet, plan: &[Batch], json: bool) -> Result<()> {
    if json {
        let output = PlanOutput {
            max_parallel: config.run.max_parallel,
            launch_mode: config.run.launch_mode,
            total_jobs: jobs.len(),
            batches: plan,
        };
        let json_output =
            serde_json::to_string_pretty(&output).context("Failed to emit plan JSON")?;
        println!("{json_output}");
        return Ok(());
    }

    println!(
        "{} job(s) in {} batch(es), up to {} at a time ({})",
        jobs.len(),
        plan.len(),
        config.run.max_parallel,
        config.run.launch_mode
    );
    for batch in plan {
        let names: Vec<String> = batch.jobs.iter().map(|job| job.file_name()).collect();
        println!("  batch {}: {}", batch.index + 1, names.join(", "));
    }
    Ok(())
}
