//! Batch orchestration engine for the two-stage decomposition/processing pipeline
//!
//! Components, leaf-first:
//!
//! - [`naming`]: where every artifact of a job lives
//! - [`jobs`]: input directory to ordered [`JobSet`], and batch slicing
//! - [`worker`]: runs decompose, relocate, process, organize for one job
//! - [`scheduler`]: bounded-concurrency batches with a barrier between them
//! - [`collector`]: aggregates outcomes into a [`RunSummary`]

pub mod collector;
pub mod jobs;
pub mod naming;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use collector::{FailedJob, ResultCollector, RunSummary};
pub use jobs::{Batch, Job, JobSet, enumerate_jobs, plan_batches};
pub use naming::{DecompositionRole, NamingScheme, OutputRole};
pub use scheduler::{
    BatchObserver, LoggingObserver, NoopObserver, Scheduler, WorkerInvocation, prepare_layout,
};
pub use worker::{FailureReason, OrganizeWarning, Stage, Worker, WorkerOutcome};
