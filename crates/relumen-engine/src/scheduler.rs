//! Batch scheduler
//!
//! Slices the job sequence into batches of `max_parallel`, launches one worker
//! per job of a batch on the blocking pool, then joins every handle of the
//! batch before the next batch starts. A failed or crashed worker never stops
//! the run; it only produces a failed outcome.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use relumen_runner::{CommandSpec, ProcessOutput, ProcessRunner};
use relumen_utils::error::PreflightError;
use relumen_utils::fs_ops::ensure_dir;
use relumen_utils::logging::{batch_span, job_span};
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, error, info, warn};

use crate::collector::{ResultCollector, RunSummary};
use crate::jobs::{Batch, Job, JobSet};
use crate::naming::{OutputRole, output_subdir};
use crate::worker::{Worker, WorkerOutcome};

/// Receives scheduling events in order: `on_batch_start`, one `on_outcome`
/// per job of the batch, `on_batch_complete`. Every outcome of batch `k` is
/// delivered before any worker of batch `k + 1` is launched.
pub trait BatchObserver {
    fn on_batch_start(&mut self, _batch: &Batch) {}

    fn on_outcome(&mut self, _batch: &Batch, _outcome: &WorkerOutcome) {}

    fn on_batch_complete(&mut self, _batch: &Batch, _outcomes: &[WorkerOutcome]) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Progress reporting through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct LoggingObserver {
    total_batches: usize,
}

impl LoggingObserver {
    #[must_use]
    pub const fn new(total_batches: usize) -> Self {
        Self { total_batches }
    }
}

impl BatchObserver for LoggingObserver {
    fn on_batch_start(&mut self, batch: &Batch) {
        info!(
            "Starting batch {}/{} ({} jobs)",
            batch.index + 1,
            self.total_batches,
            batch.len()
        );
    }

    fn on_outcome(&mut self, _batch: &Batch, outcome: &WorkerOutcome) {
        match outcome.failure_message() {
            None if outcome.warnings.is_empty() => {
                info!(job = %outcome.job, duration_ms = outcome.duration_ms, "Job succeeded");
            }
            None => info!(
                job = %outcome.job,
                duration_ms = outcome.duration_ms,
                warnings = outcome.warnings.len(),
                "Job succeeded with missing outputs"
            ),
            Some(message) => warn!(job = %outcome.job, stage = %outcome.stage, "{message}"),
        }
    }

    fn on_batch_complete(&mut self, batch: &Batch, outcomes: &[WorkerOutcome]) {
        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(
            "Batch {}/{} complete: {} succeeded, {} failed",
            batch.index + 1,
            self.total_batches,
            outcomes.len() - failed,
            failed
        );
    }
}

/// How to re-invoke a relumen executable in worker mode.
///
/// The launched command line is `program leading_args.. INPUT OUTPUT_DIR
/// INTERMEDIATE_DIR`; the child prints its [`WorkerOutcome`] as one JSON line.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
    pub timeout: Duration,
}

impl WorkerInvocation {
    /// Invocation of the running executable's hidden `worker` subcommand,
    /// forwarding the config file so the child resolves the same commands.
    pub fn current_exe(config_path: Option<&Path>, timeout: Duration) -> std::io::Result<Self> {
        let program = std::env::current_exe()?;
        let mut leading_args = Vec::new();
        if let Some(path) = config_path {
            leading_args.push(OsString::from("--config"));
            leading_args.push(path.as_os_str().to_os_string());
        }
        leading_args.push(OsString::from("worker"));
        Ok(Self {
            program,
            leading_args,
            timeout,
        })
    }

    #[must_use]
    pub fn command_for(&self, job: &Job) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.leading_args.iter().cloned())
            .arg(&job.input_path)
            .arg(&job.output_dir)
            .arg(&job.intermediate_dir)
    }
}

/// Last non-empty stdout line decoded as an outcome.
fn decode_outcome(output: &ProcessOutput) -> Option<WorkerOutcome> {
    let stdout = output.stdout_string();
    let line = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    serde_json::from_str(line).ok()
}

fn run_worker_subprocess(
    runner: &dyn ProcessRunner,
    invocation: &WorkerInvocation,
    job: &Job,
) -> WorkerOutcome {
    let spec = invocation.command_for(job);
    debug!(command = %spec.display_line(), "Launching worker subprocess");

    match runner.run(&spec, invocation.timeout) {
        Ok(output) => match decode_outcome(&output) {
            Some(outcome) => outcome,
            None => {
                let exit = output
                    .exit_code
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
                let detail = output
                    .stderr_tail()
                    .map(|tail| format!(": {tail}"))
                    .unwrap_or_default();
                WorkerOutcome::crashed(
                    job,
                    format!("worker exited with {exit} without reporting an outcome{detail}"),
                )
            }
        },
        Err(e) => WorkerOutcome::crashed(job, e.to_string()),
    }
}

#[derive(Clone)]
enum Launcher {
    InProcess(Arc<Worker>),
    Subprocess {
        runner: Arc<dyn ProcessRunner>,
        invocation: Arc<WorkerInvocation>,
    },
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProcess(worker) => f.debug_tuple("InProcess").field(worker).finish(),
            Self::Subprocess { invocation, .. } => f
                .debug_struct("Subprocess")
                .field("invocation", invocation)
                .finish_non_exhaustive(),
        }
    }
}

impl Launcher {
    fn launch(&self, job: Job, batch_index: usize) -> JoinHandle<WorkerOutcome> {
        let launcher = self.clone();
        // Created on the scheduler side so it nests under the batch span
        let span = job_span(&job.base_name, batch_index);
        tokio::task::spawn_blocking(move || {
            let _guard = span.enter();
            match launcher {
                Launcher::InProcess(worker) => worker.run(&job),
                Launcher::Subprocess { runner, invocation } => {
                    run_worker_subprocess(runner.as_ref(), &invocation, &job)
                }
            }
        })
    }
}

fn panic_reason(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            format!("panicked: {msg}")
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            format!("panicked: {msg}")
        } else {
            "panicked".to_string()
        }
    } else {
        "task was cancelled".to_string()
    }
}

/// Create the intermediate directory and the output role subdirectories.
/// Must succeed before any batch starts.
pub fn prepare_layout(output_dir: &Path, intermediate_dir: &Path) -> Result<(), PreflightError> {
    let unavailable = |path: &Path, e: std::io::Error| PreflightError::DirectoryUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    ensure_dir(intermediate_dir).map_err(|e| unavailable(intermediate_dir, e))?;
    for role in OutputRole::ALL {
        let dir = output_subdir(output_dir, role);
        ensure_dir(&dir).map_err(|e| unavailable(&dir, e))?;
    }
    Ok(())
}

/// Bounded-concurrency batch execution over a [`JobSet`].
#[derive(Debug)]
pub struct Scheduler {
    launcher: Launcher,
    max_parallel: usize,
}

impl Scheduler {
    /// Workers run on the blocking pool of the current Tokio runtime.
    #[must_use]
    pub fn in_process(worker: Worker, max_parallel: usize) -> Self {
        Self {
            launcher: Launcher::InProcess(Arc::new(worker)),
            max_parallel: max_parallel.max(1),
        }
    }

    /// Each worker is a child process started through `runner`.
    #[must_use]
    pub fn subprocess(
        runner: Arc<dyn ProcessRunner>,
        invocation: WorkerInvocation,
        max_parallel: usize,
    ) -> Self {
        Self {
            launcher: Launcher::Subprocess {
                runner,
                invocation: Arc::new(invocation),
            },
            max_parallel: max_parallel.max(1),
        }
    }

    #[must_use]
    pub const fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Batches that [`Scheduler::run`] would execute, in order.
    #[must_use]
    pub fn plan(&self, jobs: &JobSet) -> Vec<Batch> {
        jobs.batches(self.max_parallel)
    }

    /// Execute every batch in sequence and summarize the outcomes.
    pub async fn run(&self, jobs: &JobSet, observer: &mut dyn BatchObserver) -> RunSummary {
        let batches = self.plan(jobs);
        let mut collector = ResultCollector::new();
        info!(
            jobs = jobs.len(),
            batches = batches.len(),
            max_parallel = self.max_parallel,
            "Starting run"
        );

        for batch in &batches {
            let outcomes = self
                .run_batch(batch, observer)
                .instrument(batch_span(batch.index, batch.len()))
                .await;
            collector.record_batch(outcomes);
        }

        collector.finish()
    }

    async fn run_batch(
        &self,
        batch: &Batch,
        observer: &mut dyn BatchObserver,
    ) -> Vec<WorkerOutcome> {
        observer.on_batch_start(batch);

        let handles: Vec<(&Job, JoinHandle<WorkerOutcome>)> = batch
            .jobs
            .iter()
            .map(|job| (job, self.launcher.launch(job.clone(), batch.index)))
            .collect();

        // Barrier: every handle of this batch is joined before returning
        let mut outcomes = Vec::with_capacity(handles.len());
        for (job, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = panic_reason(e);
                    error!(job = %job.base_name, "Worker {reason}");
                    WorkerOutcome::crashed(job, reason)
                }
            };
            observer.on_outcome(batch, &outcome);
            outcomes.push(outcome);
        }

        observer.on_batch_complete(batch, &outcomes);
        outcomes
    }
}
