//! Error types for the runner crate

use thiserror::Error;

/// Failures to launch or supervise an external command.
///
/// A command that runs and exits non-zero is *not* an error at this level; it
/// is reported through [`ProcessOutput::exit_code`](crate::ProcessOutput).
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to launch '{program}': {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Failed to wait for '{program}': {reason}")]
    WaitFailed { program: String, reason: String },

    #[error("'{program}' timed out after {timeout_seconds} seconds")]
    Timeout {
        program: String,
        timeout_seconds: u64,
    },

    #[error("Process monitoring for '{program}' terminated unexpectedly")]
    MonitorLost { program: String },
}

impl RunnerError {
    /// Name of the program the error refers to.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::LaunchFailed { program, .. }
            | Self::WaitFailed { program, .. }
            | Self::Timeout { program, .. }
            | Self::MonitorLost { program } => program,
        }
    }

    /// Whether the failure was a timeout rather than a launch problem.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
