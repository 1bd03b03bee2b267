//! Doctor command implementation
//!
//! Handles `relumen doctor` for environment health checks.

use std::sync::Arc;

use anyhow::{Context, Result};

use relumen_config::Config;
use relumen_doctor::{CheckStatus, DoctorCommand, DoctorOutput};
use relumen_runner::{NativeRunner, ProcessRunner};
use relumen_utils::exit_codes::ExitCode;

/// Execute the doctor command for environment health checks
pub fn execute_doctor_command(json: bool, strict_exit: bool, config: &Config) -> Result<ExitCode> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(NativeRunner::new());
    let output = DoctorCommand::new(config.clone(), runner).run_with_options_strict(strict_exit);

    if json {
        let json_output =
            serde_json::to_string_pretty(&output).context("Failed to emit doctor JSON")?;
        println!("{json_output}");
    } else {
        print_report(&output);

        if !output.ok {
            println!();
            if strict_exit {
                println!(
                    "Some checks failed or warned (strict mode). Please address the issues above."
                );
            } else {
                println!(
                    "Some checks failed. Please address the issues above before running relumen."
                );
            }
        }
    }

    // Warnings only count against the exit code in strict mode
    if output.ok {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::INTERNAL)
    }
}

fn print_report(output: &DoctorOutput) {
    println!("relumen doctor");
    for check in &output.checks {
        let marker = match check.status {
            CheckStatus::Pass => "✓",
            CheckStatus::Warn => "!",
            CheckStatus::Fail => "✗",
        };
        println!("  {marker} {:<22} {}", check.name, check.details);
    }
}
