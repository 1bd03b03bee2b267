//! Structured logging for runs, batches, jobs and stages
//!
//! The CLI calls [`init_tracing`] once. Everything else logs through `tracing`
//! macros; the helpers here keep field names consistent (`job`, `stage`,
//! `batch`, `duration_ms`) so log lines can be filtered per job.

use std::io::IsTerminal;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Colored output only on a terminal and when `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so that stdout stays reserved for summaries and for the
/// JSON outcome line printed in worker invocation mode. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("relumen=debug,info")
            } else {
                EnvFilter::try_new("relumen=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one job from decomposition through organization.
pub fn job_span(job: &str, batch: usize) -> tracing::Span {
    span!(Level::INFO, "job", job = %job, batch = batch)
}

/// Span covering one batch, from launch to barrier.
pub fn batch_span(batch: usize, size: usize) -> tracing::Span {
    span!(Level::INFO, "batch", batch = batch, size = size)
}

pub fn log_stage_start(job: &str, stage: &str) {
    info!(job = %job, stage = %stage, "Starting stage");
}

pub fn log_stage_complete(job: &str, stage: &str, duration_ms: u128) {
    info!(
        job = %job,
        stage = %stage,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

/// Log a job-fatal stage failure. `message` is the stage-qualified text shown
/// to the user, e.g. "Decomposition failed: intermediate files not found".
pub fn log_stage_error(job: &str, stage: &str, message: &str, duration_ms: u128) {
    error!(
        job = %job,
        stage = %stage,
        duration_ms = %duration_ms,
        "{message}"
    );
}
