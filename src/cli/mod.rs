//! Command-line interface for relumen
//!
//! - `args`: clap definitions
//! - `run`: entry point, config discovery, runtime, dispatch, error output
//! - `commands`: `run`, `doctor` and the hidden `worker` subcommand

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
