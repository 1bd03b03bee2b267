//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initializes logging, discovers the config,
//! creates the tokio runtime, dispatches to a command handler and prints
//! every error itself.

use clap::Parser;

use relumen_config::{CliArgs, Config};
use relumen_utils::error::RelumenError;
use relumen_utils::exit_codes::ExitCode;
use relumen_utils::logging::init_tracing;

use super::args::{Cli, Commands};
use super::commands::{self, RunRequest};

/// Main CLI execution function.
///
/// Returns `Err(code)` for any non-zero exit; main.rs only calls
/// `std::process::exit` and prints nothing.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let cli_args = match &cli.command {
        Commands::Run {
            max_parallel,
            launch_mode,
            ..
        } => CliArgs {
            config_path: cli.config.clone(),
            max_parallel: *max_parallel,
            launch_mode: *launch_mode,
        },
        Commands::Doctor { .. } | Commands::Worker { .. } => CliArgs {
            config_path: cli.config.clone(),
            ..CliArgs::default()
        },
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = RelumenError::from(err);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.name();
    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                input_dir,
                output_dir,
                intermediate_dir,
                dry_run,
                json,
                ..
            } => {
                let request = RunRequest {
                    input_dir,
                    output_dir,
                    intermediate_dir,
                    dry_run,
                    json,
                };
                commands::execute_run_command(&request, &config).await
            }
            Commands::Doctor { json, strict_exit } => {
                commands::execute_doctor_command(json, strict_exit, &config)
            }
            Commands::Worker {
                input_path,
                output_dir,
                intermediate_dir,
            } => commands::execute_worker_command(
                &input_path,
                &output_dir,
                &intermediate_dir,
                &config,
            ),
        }
    });

    match result {
        Ok(code) if code.is_success() => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(relumen_error) = error.downcast_ref::<RelumenError>() {
                eprintln!("{}", relumen_error.display_for_user());
                Err(relumen_error.to_exit_code())
            } else {
                eprintln!("✗ Unexpected error during {operation}: {error:#}");
                eprintln!("\n  Run with --verbose for more detailed output");
                Err(ExitCode::INTERNAL)
            }
        }
    }
}
