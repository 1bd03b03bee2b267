//! Result collection and the run summary
//!
//! The collector is append-only and owned by the scheduler, which records a
//! batch's outcomes only after joining all of its workers. Workers never see
//! it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use relumen_utils::exit_codes::ExitCode;

use crate::worker::{FailureReason, Stage, WorkerOutcome};

/// A job that did not succeed, with where and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub job: String,
    pub input: PathBuf,
    pub stage: Stage,
    pub reason: FailureReason,
}

/// Aggregate of every outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: usize,
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed jobs counted by the stage they failed in
    pub failures_by_stage: BTreeMap<Stage, usize>,
    /// Failed jobs counted by [`FailureReason::kind`]
    pub failures_by_reason: BTreeMap<String, usize>,
    /// Missing or unmovable outputs across all successful jobs
    pub organize_warnings: usize,
    pub failed_jobs: Vec<FailedJob>,
    pub outcomes: Vec<WorkerOutcome>,
}

impl RunSummary {
    /// `SUCCESS` when every job succeeded (including an empty run), else `JOBS_FAILED`.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::JOBS_FAILED
        }
    }

    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Plain-text report for the terminal.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Processed {} job(s) in {} batch(es): {} succeeded, {} failed",
            self.total_jobs, self.batches, self.succeeded, self.failed
        );
        if self.organize_warnings > 0 {
            let _ = writeln!(
                out,
                "{} expected output(s) were not produced or could not be organized",
                self.organize_warnings
            );
        }
        if !self.failures_by_stage.is_empty() {
            let by_stage: Vec<String> = self
                .failures_by_stage
                .iter()
                .map(|(stage, count)| format!("{stage}: {count}"))
                .collect();
            let _ = writeln!(out, "Failures by stage: {}", by_stage.join(", "));
        }
        if !self.failed_jobs.is_empty() {
            let _ = writeln!(out, "Failed jobs:");
            for failed in &self.failed_jobs {
                let input = failed
                    .input
                    .file_name()
                    .map_or_else(|| failed.job.clone(), |n| n.to_string_lossy().into_owned());
                let _ = writeln!(
                    out,
                    "  {input}: {} failed: {} [{}]",
                    failed.stage.label(),
                    failed.reason,
                    failed.reason.kind()
                );
            }
        }
        out
    }
}

/// Accumulates outcomes batch by batch.
#[derive(Debug)]
pub struct ResultCollector {
    started_at: DateTime<Utc>,
    batches: usize,
    outcomes: Vec<WorkerOutcome>,
}

impl Default for ResultCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCollector {
    /// Start collecting; the run's start time is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            batches: 0,
            outcomes: Vec::new(),
        }
    }

    /// Record the outcomes of one joined batch.
    pub fn record_batch(&mut self, outcomes: Vec<WorkerOutcome>) {
        self.batches += 1;
        self.outcomes.extend(outcomes);
    }

    #[must_use]
    pub fn finish(self) -> RunSummary {
        let mut failures_by_stage = BTreeMap::new();
        let mut failures_by_reason = BTreeMap::new();
        let mut failed_jobs = Vec::new();
        let mut organize_warnings = 0;

        for outcome in &self.outcomes {
            organize_warnings += outcome.warnings.len();
            if outcome.success {
                continue;
            }
            *failures_by_stage.entry(outcome.stage).or_insert(0) += 1;
            let reason = outcome
                .error
                .clone()
                .unwrap_or_else(|| FailureReason::WorkerCrashed {
                    reason: "failed without a reason".to_string(),
                });
            *failures_by_reason
                .entry(reason.kind().to_string())
                .or_insert(0) += 1;
            failed_jobs.push(FailedJob {
                job: outcome.job.clone(),
                input: outcome.input.clone(),
                stage: outcome.stage,
                reason,
            });
        }

        let total_jobs = self.outcomes.len();
        let failed = failed_jobs.len();
        RunSummary {
            started_at: self.started_at,
            finished_at: Utc::now(),
            batches: self.batches,
            total_jobs,
            succeeded: total_jobs - failed,
            failed,
            failures_by_stage,
            failures_by_reason,
            organize_warnings,
            failed_jobs,
            outcomes: self.outcomes,
        }
    }
}
