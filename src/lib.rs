//! relumen - batch orchestrator for a two-stage image pipeline
//!
//! relumen walks a directory of images and, for each one, runs an external
//! decomposition command (producing reflectance and shading layers) and then
//! an external processing command (producing brightened, enhanced and
//! reconstructed results). Jobs run in fixed-size batches with a barrier
//! between batches; one failing job never stops the run.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Process ./photos with up to 4 concurrent jobs
//! relumen run ./photos ./results ./intermediate 4
//!
//! # Show the batch plan without launching anything
//! relumen run ./photos ./results ./intermediate --dry-run
//!
//! # Check that the stage commands resolve and the directories are usable
//! relumen doctor --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use relumen::{Config, NamingScheme, NativeRunner, NoopObserver, Scheduler, Worker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder().max_parallel(4).build()?;
//! let jobs = relumen::enumerate_jobs(
//!     Path::new("photos"),
//!     Path::new("intermediate"),
//!     Path::new("results"),
//!     &config.enumeration,
//! )?;
//!
//! relumen::prepare_layout(Path::new("results"), Path::new("intermediate"))?;
//! let worker = Worker::new(
//!     Arc::new(NativeRunner::new()),
//!     NamingScheme::from_config(&config.naming),
//!     config.commands.clone(),
//! );
//! let summary = Scheduler::in_process(worker, config.run.max_parallel)
//!     .run(&jobs, &mut NoopObserver)
//!     .await;
//! println!("{}", summary.render_text());
//! # Ok(())
//! # }
//! ```
//!
//! # Exit codes
//!
//! See [`ExitCode`]: 0 success, 1 internal error, 2 bad arguments or
//! configuration, 3 some jobs failed, 4 input enumeration failed, 69
//! pre-flight failure.

pub mod cli;

pub use relumen_config::{CliArgs, Config, ConfigBuilder, LaunchMode, StageCommand};
pub use relumen_doctor::{CheckStatus, DoctorCheck, DoctorCommand, DoctorOutput, RunDirectories};
pub use relumen_engine::{
    Batch, BatchObserver, FailureReason, Job, JobSet, LoggingObserver, NamingScheme,
    NoopObserver, OrganizeWarning, OutputRole, ResultCollector, RunSummary, Scheduler, Stage,
    Worker, WorkerInvocation, WorkerOutcome, enumerate_jobs, plan_batches, prepare_layout,
};
pub use relumen_runner::{CommandSpec, NativeRunner, ProcessOutput, ProcessRunner};
pub use relumen_utils::error::{RelumenError, UserFriendlyError};
pub use relumen_utils::exit_codes::ExitCode;
