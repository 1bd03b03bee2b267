//! Hidden `worker` subcommand: one job in its own process.
//!
//! The parent scheduler reads the last stdout line as a `WorkerOutcome`.
//! Logs go to stderr so that line is never interleaved with anything.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use relumen_config::Config;
use relumen_engine::{Job, NamingScheme, Worker};
use relumen_runner::NativeRunner;
use relumen_utils::error::RelumenError;
use relumen_utils::exit_codes::ExitCode;

/// Run the pipeline for `input_path` and print the outcome as one JSON line.
pub fn execute_worker_command(
    input_path: &Path,
    output_dir: &Path,
    intermediate_dir: &Path,
    config: &Config,
) -> Result<ExitCode> {
    let job = Job::from_input(input_path, intermediate_dir, output_dir).ok_or_else(|| {
        RelumenError::Runtime {
            reason: format!("Cannot derive a job from {}", input_path.display()),
        }
    })?;

    let worker = Worker::new(
        Arc::new(NativeRunner::new()),
        NamingScheme::from_config(&config.naming),
        config.commands.clone(),
    );
    let outcome = worker.run(&job);

    let line = serde_json::to_string(&outcome).context("Failed to encode worker outcome")?;
    println!("{line}");

    if outcome.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::INTERNAL)
    }
}
