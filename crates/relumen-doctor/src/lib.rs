//! Doctor command for environment health checks
//!
//! The same checks back the `doctor` subcommand and the pre-flight step of
//! `run`: stage programs resolvable, process launcher able to spawn, worker
//! executable present in subprocess mode, run directories usable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use relumen_config::{Config, LaunchMode, StageCommand};
use relumen_runner::{CommandSpec, ProcessRunner};
use relumen_utils::error::PreflightError;
use relumen_utils::fs_ops::ensure_dir;
use tracing::debug;

/// Status of a health check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Individual health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            details: details.into(),
        }
    }
}

/// Result of a doctor run; checks are sorted by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOutput {
    pub schema_version: String,
    pub emitted_at: DateTime<Utc>,
    /// False if any check failed (or warned, in strict mode)
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

impl DoctorOutput {
    /// `name: details` of every failed check
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| format!("{}: {}", c.name, c.details))
            .collect()
    }
}

/// Directories a run will use.
#[derive(Debug, Clone)]
pub struct RunDirectories {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub intermediate_dir: PathBuf,
}

/// How long the launcher check may take
const LAUNCHER_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Doctor command implementation
pub struct DoctorCommand {
    config: Config,
    runner: Arc<dyn ProcessRunner>,
    directories: Option<RunDirectories>,
}

impl DoctorCommand {
    #[must_use]
    pub fn new(config: Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            config,
            runner,
            directories: None,
        }
    }

    /// Also check the directories of a specific run.
    #[must_use]
    pub fn with_directories(mut self, directories: RunDirectories) -> Self {
        self.directories = Some(directories);
        self
    }

    /// Run all health checks
    #[must_use]
    pub fn run(&self) -> DoctorOutput {
        self.run_with_options_strict(false)
    }

    /// Run all health checks; in strict mode warnings also clear `ok`.
    #[must_use]
    pub fn run_with_options_strict(&self, strict_exit: bool) -> DoctorOutput {
        let mut checks = vec![
            self.check_config_parse(),
            self.check_program("decompose_program", &self.config.commands.decompose),
            self.check_program("process_program", &self.config.commands.process),
            self.check_process_launcher(),
            self.check_launch_mode(),
        ];

        if let Some(dirs) = &self.directories {
            checks.push(check_input_dir(&dirs.input_dir));
            checks.push(check_writable("output_dir", &dirs.output_dir));
            checks.push(check_writable("intermediate_dir", &dirs.intermediate_dir));
            checks.push(check_same_filesystem(&dirs.input_dir, &dirs.intermediate_dir));
        }

        checks.sort_by(|a, b| a.name.cmp(&b.name));

        let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
        let has_warn = checks.iter().any(|c| c.status == CheckStatus::Warn);
        for check in &checks {
            debug!(check = %check.name, status = ?check.status, "{}", check.details);
        }

        DoctorOutput {
            schema_version: "1".to_string(),
            emitted_at: Utc::now(),
            ok: !has_fail && (!strict_exit || !has_warn),
            checks,
        }
    }

    fn check_config_parse(&self) -> DoctorCheck {
        // Config is already parsed and validated by the time the doctor runs
        let details = match &self.config.config_path {
            Some(path) => format!("Loaded {}", path.display()),
            None => "No config file found; using built-in defaults".to_string(),
        };
        DoctorCheck::new("config_parse", CheckStatus::Pass, details)
    }

    /// Resolve a stage program the way the launcher will: through PATH, or
    /// relative to the command's working directory when it contains a separator.
    fn check_program(&self, name: &str, command: &StageCommand) -> DoctorCheck {
        let cwd = command
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        match which::which_in(&command.program, std::env::var_os("PATH"), &cwd) {
            Ok(path) => DoctorCheck::new(
                name,
                CheckStatus::Pass,
                format!("Found {} at {}", command.program, path.display()),
            ),
            Err(e) => DoctorCheck::new(
                name,
                CheckStatus::Fail,
                format!("'{}' cannot be resolved: {e}", command.program),
            ),
        }
    }

    /// Spawn a trivial process through the configured launcher.
    fn check_process_launcher(&self) -> DoctorCheck {
        let version_cmd = match std::env::current_exe() {
            Ok(exe) => CommandSpec::new(exe).arg("--version"),
            Err(e) => {
                return DoctorCheck::new(
                    "process_launcher",
                    CheckStatus::Fail,
                    format!("Cannot locate the current executable: {e}"),
                );
            }
        };

        match self.runner.run(&version_cmd, LAUNCHER_CHECK_TIMEOUT) {
            Ok(_) => DoctorCheck::new(
                "process_launcher",
                CheckStatus::Pass,
                "Child processes can be launched",
            ),
            Err(e) => DoctorCheck::new(
                "process_launcher",
                CheckStatus::Fail,
                format!("Cannot launch child processes: {e}"),
            ),
        }
    }

    fn check_launch_mode(&self) -> DoctorCheck {
        match self.config.run.launch_mode {
            LaunchMode::InProcess => DoctorCheck::new(
                "launch_mode",
                CheckStatus::Pass,
                format!(
                    "in_process: up to {} workers on the blocking thread pool",
                    self.config.run.max_parallel
                ),
            ),
            LaunchMode::Subprocess => match std::env::current_exe() {
                Ok(exe) if exe.is_file() => DoctorCheck::new(
                    "launch_mode",
                    CheckStatus::Pass,
                    format!("subprocess: workers re-invoke {}", exe.display()),
                ),
                Ok(exe) => DoctorCheck::new(
                    "launch_mode",
                    CheckStatus::Fail,
                    format!("subprocess: worker executable {} is missing", exe.display()),
                ),
                Err(e) => DoctorCheck::new(
                    "launch_mode",
                    CheckStatus::Fail,
                    format!("subprocess: cannot locate worker executable: {e}"),
                ),
            },
        }
    }
}

fn check_input_dir(input_dir: &Path) -> DoctorCheck {
    match std::fs::read_dir(input_dir) {
        Ok(_) => DoctorCheck::new(
            "input_dir",
            CheckStatus::Pass,
            format!("{} is readable", input_dir.display()),
        ),
        Err(e) => DoctorCheck::new(
            "input_dir",
            CheckStatus::Fail,
            format!("{} is not a readable directory: {e}", input_dir.display()),
        ),
    }
}

/// Create `dir` if needed and write a scratch file into it.
fn check_writable(name: &str, dir: &Path) -> DoctorCheck {
    if let Err(e) = ensure_dir(dir) {
        return DoctorCheck::new(
            name,
            CheckStatus::Fail,
            format!("Cannot create {}: {e}", dir.display()),
        );
    }
    match tempfile::Builder::new()
        .prefix(".relumen-scratch")
        .tempfile_in(dir)
    {
        Ok(_) => DoctorCheck::new(
            name,
            CheckStatus::Pass,
            format!("{} is writable", dir.display()),
        ),
        Err(e) => DoctorCheck::new(
            name,
            CheckStatus::Fail,
            format!("Cannot write to {}: {e}", dir.display()),
        ),
    }
}

/// Artifacts move from the input directory to the intermediate directory.
/// A plain rename needs both on one filesystem; otherwise moves copy.
fn check_same_filesystem(input_dir: &Path, intermediate_dir: &Path) -> DoctorCheck {
    let scratch = match tempfile::Builder::new()
        .prefix(".relumen-rename")
        .tempfile_in(input_dir)
    {
        Ok(scratch) => scratch,
        Err(e) => {
            return DoctorCheck::new(
                "same_filesystem",
                CheckStatus::Warn,
                format!("Cannot create a scratch file in {}: {e}", input_dir.display()),
            );
        }
    };

    let mut target_name = OsString::from(".relumen-rename-target-");
    target_name.push(std::process::id().to_string());
    let target = intermediate_dir.join(target_name);

    match std::fs::rename(scratch.path(), &target) {
        Ok(()) => {
            let _ = std::fs::remove_file(&target);
            DoctorCheck::new(
                "same_filesystem",
                CheckStatus::Pass,
                "Artifacts are relocated with an atomic rename",
            )
        }
        Err(e) => DoctorCheck::new(
            "same_filesystem",
            CheckStatus::Warn,
            format!("Rename into the intermediate directory failed ({e}); moves will copy instead"),
        ),
    }
}

/// Run the checks a `run` must pass before any batch starts.
pub fn preflight(
    config: &Config,
    runner: Arc<dyn ProcessRunner>,
    directories: RunDirectories,
) -> Result<DoctorOutput, PreflightError> {
    let output = DoctorCommand::new(config.clone(), runner)
        .with_directories(directories)
        .run();
    let failures = output.failures();
    if failures.is_empty() {
        Ok(output)
    } else {
        Err(PreflightError::CapabilityUnavailable { failures })
    }
}
