//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use relumen_config::LaunchMode;

/// relumen - batch orchestrator for intrinsic image decomposition and enhancement
#[derive(Parser, Debug)]
#[command(name = "relumen")]
#[command(about = "Run a two-stage image decomposition and enhancement pipeline over a directory")]
#[command(long_about = r#"
relumen runs an external decomposition command and an external processing command
for every image in a directory, a fixed number of images at a time.

For each input <base>.<ext>:
  1. decomposition writes <base>-r.png and <base>-s.png next to the input
  2. both are moved into INTERMEDIATE_DIR
  3. processing writes <base>-brightened/-enhanced/-reconstructed into OUTPUT_DIR
  4. each result is moved into OUTPUT_DIR/<role>/

A failed job is reported and skipped; the run continues.

EXAMPLES:
  # Process ./photos, 8 images at a time (the default)
  relumen run ./photos ./results ./intermediate

  # Two at a time, each worker in its own process
  relumen run ./photos ./results ./intermediate 2 --launch-mode subprocess

  # Show the batch plan only
  relumen run ./photos ./results ./intermediate --dry-run

  # Check the environment
  relumen doctor

CONFIGURATION:
  Configuration is loaded with precedence: CLI arguments > config file > defaults
  Config file is discovered by searching upward from CWD for .relumen/config.toml
  Use --config to specify an explicit config file path

EXIT CODES:
  0 all jobs succeeded, 1 internal error, 2 invalid arguments or configuration,
  3 one or more jobs failed, 4 input directory unusable, 69 pre-flight failure
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every image in INPUT_DIR
    Run {
        /// Directory of input images (not searched recursively)
        input_dir: PathBuf,

        /// Output root; results are organized into role subdirectories
        output_dir: PathBuf,

        /// Directory receiving the decomposition layers
        intermediate_dir: PathBuf,

        /// Jobs launched concurrently per batch [default: 8]
        max_parallel: Option<usize>,

        /// How workers are launched: in_process or subprocess
        #[arg(long)]
        launch_mode: Option<LaunchMode>,

        /// Print the batch plan without running anything
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary (or plan) as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check stage programs, process launching and directories
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Treat warnings as failures for the exit code
        #[arg(long)]
        strict_exit: bool,
    },

    /// Run the pipeline for a single input and print its outcome as JSON
    #[command(hide = true)]
    Worker {
        input_path: PathBuf,
        output_dir: PathBuf,
        intermediate_dir: PathBuf,
    },
}

impl Commands {
    /// Operation name used in error reports
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Doctor { .. } => "doctor",
            Self::Worker { .. } => "worker",
        }
    }
}
