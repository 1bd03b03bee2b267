//! CLI command implementations
//!
//! Each handler returns the exit code it wants; errors that abort the
//! command are returned as `anyhow::Error` and reported by `run.rs`.

mod doctor;
mod run;
mod worker;

pub use doctor::execute_doctor_command;
pub use run::{RunRequest, execute_run_command};
pub use worker::execute_worker_command;
