use crate::error::RunnerError;
use std::time::Duration;

use super::CommandSpec;

// ============================================================================
// ProcessRunner Trait - the Process Launcher capability
// ============================================================================

/// Output from a process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Standard output from the process
    pub stdout: Vec<u8>,
    /// Standard error from the process
    pub stderr: Vec<u8>,
    /// Exit code from the process (None if terminated by signal)
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
        }
    }

    /// Output of a process that exited with `code` and printed nothing.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self::new(Vec::new(), Vec::new(), Some(code))
    }

    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Last non-empty line of stderr, trimmed. Used to give failed stage
    /// commands a one-line reason in logs and summaries.
    #[must_use]
    pub fn stderr_tail(&self) -> Option<String> {
        self.stderr_string()
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToString::to_string)
    }

    /// The exit signal the orchestrator acts on: exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a command to completion and reports how it exited.
///
/// This is the only way the orchestrator reaches external programs. The real
/// implementation is [`NativeRunner`](crate::NativeRunner); tests substitute
/// fakes that touch the filesystem the way a stage command would.
///
/// # Contract
///
/// - Blocking run-to-completion semantics. Callers that need concurrency run
///   several `run` calls on separate threads, hence the `Send + Sync` bound.
/// - `Ok(output)` whenever the process was started and exited, whatever its
///   exit code. `Err` only when it could not be launched, could not be awaited,
///   or exceeded `timeout`.
/// - Implementations MUST use argv-style APIs only (no `sh -c`, no `cmd /C`).
pub trait ProcessRunner: Send + Sync {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

impl<T: ProcessRunner + ?Sized> ProcessRunner for std::sync::Arc<T> {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        (**self).run(cmd, timeout)
    }
}
