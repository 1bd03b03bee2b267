//! Per-job pipeline: decompose, relocate, process, organize
//!
//! [`Worker::run`] never returns an error. Every failure of a job becomes a
//! [`WorkerOutcome`]; only organize-stage problems are soft and end up as
//! [`OrganizeWarning`]s on an otherwise successful outcome.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use relumen_config::{CommandsConfig, StageCommand, TemplateVars};
use relumen_runner::{ProcessRunner, RunnerError};
use relumen_utils::fs_ops::{is_regular_file, move_file};
use relumen_utils::logging::{log_stage_complete, log_stage_error, log_stage_start};
use tracing::{debug, warn};

use crate::jobs::Job;
use crate::naming::{DecompositionRole, NamingScheme, OutputRole};

/// Pipeline stage a job reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decompose,
    Process,
    Organize,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decompose => "decompose",
            Self::Process => "process",
            Self::Organize => "organize",
        }
    }

    /// Noun used in user-facing failure messages
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Decompose => "Decomposition",
            Self::Process => "Processing",
            Self::Organize => "Organization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Decomposition exited 0 but did not write both artifacts
    MissingArtifact { missing: Vec<PathBuf> },
    /// An artifact could not be relocated into the intermediate directory
    MoveFailed { path: PathBuf, reason: String },
    /// A stage command exited non-zero or was killed by a signal
    CommandFailed {
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stderr_tail: Option<String>,
    },
    TimedOut { timeout_secs: u64 },
    /// A stage command could not be started or supervised
    LaunchFailed { reason: String },
    /// The worker itself panicked or its subprocess produced no outcome
    WorkerCrashed { reason: String },
}

impl FailureReason {
    /// Stable name used for grouping in summaries
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingArtifact { .. } => "MissingArtifact",
            Self::MoveFailed { .. } => "MoveFailed",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::TimedOut { .. } => "TimedOut",
            Self::LaunchFailed { .. } => "LaunchFailed",
            Self::WorkerCrashed { .. } => "WorkerCrashed",
        }
    }

    fn from_runner_error(err: &RunnerError) -> Self {
        match err {
            RunnerError::Timeout {
                timeout_seconds, ..
            } => Self::TimedOut {
                timeout_secs: *timeout_seconds,
            },
            other => Self::LaunchFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArtifact { .. } => write!(f, "intermediate files not found"),
            Self::MoveFailed { path, reason } => {
                write!(f, "could not move {}: {reason}", path.display())
            }
            Self::CommandFailed {
                exit_code,
                stderr_tail,
            } => {
                match exit_code {
                    Some(code) => write!(f, "command exited with code {code}")?,
                    None => write!(f, "command terminated by signal")?,
                }
                if let Some(tail) = stderr_tail {
                    write!(f, " ({tail})")?;
                }
                Ok(())
            }
            Self::TimedOut { timeout_secs } => {
                write!(f, "command timed out after {timeout_secs}s")
            }
            Self::LaunchFailed { reason } => write!(f, "{reason}"),
            Self::WorkerCrashed { reason } => write!(f, "worker crashed: {reason}"),
        }
    }
}

/// A non-fatal organize-stage problem with one output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeWarning {
    pub role: OutputRole,
    pub path: PathBuf,
    /// `None` when the artifact was simply not produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_error: Option<String>,
}

impl fmt::Display for OrganizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.move_error {
            None => write!(f, "{} output not found: {}", self.role, self.path.display()),
            Some(reason) => write!(
                f,
                "{} output could not be moved: {}: {reason}",
                self.role,
                self.path.display()
            ),
        }
    }
}

/// Result of one job. Printed as a single JSON line in worker invocation mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    /// Base name of the job
    pub job: String,
    pub input: PathBuf,
    pub stage: Stage,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<OrganizeWarning>,
    pub duration_ms: u64,
}

impl WorkerOutcome {
    #[must_use]
    pub fn succeeded(job: &Job, warnings: Vec<OrganizeWarning>, duration: Duration) -> Self {
        Self {
            job: job.base_name.clone(),
            input: job.input_path.clone(),
            stage: Stage::Organize,
            success: true,
            error: None,
            warnings,
            duration_ms: duration_ms(duration),
        }
    }

    #[must_use]
    pub fn failed(job: &Job, stage: Stage, reason: FailureReason, duration: Duration) -> Self {
        Self {
            job: job.base_name.clone(),
            input: job.input_path.clone(),
            stage,
            success: false,
            error: Some(reason),
            warnings: Vec::new(),
            duration_ms: duration_ms(duration),
        }
    }

    /// Outcome recorded when no real outcome could be obtained from a worker.
    /// The stage is unknown and reported as `Decompose`.
    #[must_use]
    pub fn crashed(job: &Job, reason: impl Into<String>) -> Self {
        Self::failed(
            job,
            Stage::Decompose,
            FailureReason::WorkerCrashed {
                reason: reason.into(),
            },
            Duration::ZERO,
        )
    }

    /// Stage-qualified message, e.g. "Decomposition failed: intermediate files not found"
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|reason| format!("{} failed: {reason}", self.stage.label()))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Executes the pipeline for one job at a time.
///
/// Holds no per-job state, so a single worker can be shared across the
/// blocking tasks of a batch.
pub struct Worker {
    runner: Arc<dyn ProcessRunner>,
    naming: NamingScheme,
    commands: CommandsConfig,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("naming", &self.naming)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

/// Early exit from a stage: where and why.
struct StageFailure {
    stage: Stage,
    reason: FailureReason,
}

impl StageFailure {
    fn new(stage: Stage, reason: FailureReason) -> Self {
        Self { stage, reason }
    }
}

impl Worker {
    #[must_use]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        naming: NamingScheme,
        commands: CommandsConfig,
    ) -> Self {
        Self {
            runner,
            naming,
            commands,
        }
    }

    #[must_use]
    pub fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    /// Run the whole pipeline for `job` and report exactly one outcome.
    pub fn run(&self, job: &Job) -> WorkerOutcome {
        let started = Instant::now();

        match self.run_stages(job) {
            Ok(warnings) => {
                debug!(job = %job.base_name, warnings = warnings.len(), "Job succeeded");
                WorkerOutcome::succeeded(job, warnings, started.elapsed())
            }
            Err(failure) => {
                let outcome =
                    WorkerOutcome::failed(job, failure.stage, failure.reason, started.elapsed());
                if let Some(message) = outcome.failure_message() {
                    log_stage_error(
                        &job.base_name,
                        failure.stage.as_str(),
                        &message,
                        u128::from(outcome.duration_ms),
                    );
                }
                outcome
            }
        }
    }

    fn run_stages(&self, job: &Job) -> Result<Vec<OrganizeWarning>, StageFailure> {
        self.decompose(job)?;
        self.relocate(job)?;
        self.process(job)?;
        Ok(self.organize(job))
    }

    fn base_vars(job: &Job) -> TemplateVars {
        TemplateVars {
            input: job.input_path.clone(),
            input_dir: job.input_dir.clone(),
            base: job.base_name.clone(),
            ..TemplateVars::default()
        }
    }

    /// Render and run one stage command; `Ok` only on exit code 0.
    fn run_command(
        &self,
        stage: Stage,
        command: &StageCommand,
        vars: &TemplateVars,
    ) -> Result<(), StageFailure> {
        let spec = command.render(stage.as_str(), vars).map_err(|e| {
            StageFailure::new(
                stage,
                FailureReason::LaunchFailed {
                    reason: e.to_string(),
                },
            )
        })?;
        debug!(stage = %stage, command = %spec.display_line(), "Launching stage command");

        let output = self
            .runner
            .run(&spec, command.timeout())
            .map_err(|e| StageFailure::new(stage, FailureReason::from_runner_error(&e)))?;

        if !output.stdout.is_empty() {
            debug!(stage = %stage, stdout = %output.stdout_string().trim_end(), "Stage command stdout");
        }
        if output.success() {
            Ok(())
        } else {
            Err(StageFailure::new(
                stage,
                FailureReason::CommandFailed {
                    exit_code: output.exit_code,
                    stderr_tail: output.stderr_tail(),
                },
            ))
        }
    }

    fn decompose(&self, job: &Job) -> Result<(), StageFailure> {
        let started = Instant::now();
        log_stage_start(&job.base_name, Stage::Decompose.as_str());

        self.run_command(
            Stage::Decompose,
            &self.commands.decompose,
            &Self::base_vars(job),
        )?;

        let missing: Vec<PathBuf> = DecompositionRole::ALL
            .iter()
            .map(|role| self.naming.decomposition_artifact(job, *role))
            .filter(|path| !is_regular_file(path))
            .collect();
        if !missing.is_empty() {
            return Err(StageFailure::new(
                Stage::Decompose,
                FailureReason::MissingArtifact { missing },
            ));
        }

        log_stage_complete(
            &job.base_name,
            Stage::Decompose.as_str(),
            started.elapsed().as_millis(),
        );
        Ok(())
    }

    /// Move both decomposition artifacts into the intermediate directory.
    /// Failures count against the decompose stage.
    fn relocate(&self, job: &Job) -> Result<(), StageFailure> {
        for role in DecompositionRole::ALL {
            let from = self.naming.decomposition_artifact(job, role);
            let to = self.naming.intermediate_artifact(job, role);
            match move_file(&from, &to) {
                Ok(result) => {
                    if result.used_cross_filesystem_fallback {
                        debug!(job = %job.base_name, artifact = %role, "Relocated across filesystems");
                    }
                }
                Err(e) => {
                    return Err(StageFailure::new(
                        Stage::Decompose,
                        FailureReason::MoveFailed {
                            path: from,
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }

    fn process(&self, job: &Job) -> Result<(), StageFailure> {
        let started = Instant::now();
        log_stage_start(&job.base_name, Stage::Process.as_str());

        let vars = TemplateVars {
            reflectance: Some(
                self.naming
                    .intermediate_artifact(job, DecompositionRole::Reflectance),
            ),
            shading: Some(self.naming.intermediate_artifact(job, DecompositionRole::Shading)),
            output_dir: Some(job.output_dir.clone()),
            ..Self::base_vars(job)
        };
        // Exit status alone decides this stage; outputs are checked while organizing
        self.run_command(Stage::Process, &self.commands.process, &vars)?;

        log_stage_complete(
            &job.base_name,
            Stage::Process.as_str(),
            started.elapsed().as_millis(),
        );
        Ok(())
    }

    /// Move each output into its role subdirectory. Never fails the job.
    fn organize(&self, job: &Job) -> Vec<OrganizeWarning> {
        let started = Instant::now();
        log_stage_start(&job.base_name, Stage::Organize.as_str());

        let mut warnings = Vec::new();
        for role in OutputRole::ALL {
            let from = self.naming.output_artifact(job, role);
            if !is_regular_file(&from) {
                warnings.push(OrganizeWarning {
                    role,
                    path: from,
                    move_error: None,
                });
                continue;
            }
            let to = self.naming.organized_artifact(job, role);
            if let Err(e) = move_file(&from, &to) {
                warnings.push(OrganizeWarning {
                    role,
                    path: from,
                    move_error: Some(e.to_string()),
                });
            }
        }

        for warning in &warnings {
            warn!(job = %job.base_name, stage = "organize", "{warning}");
        }
        log_stage_complete(
            &job.base_name,
            Stage::Organize.as_str(),
            started.elapsed().as_millis(),
        );
        warnings
    }
}
