//! Exit code constants for the relumen CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Every job succeeded |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `JOBS_FAILED` | The run completed but one or more jobs failed |
//! | 4 | `ENUMERATION_FAILED` | Input directory missing, unreadable or ambiguous |
//! | 69 | `PREFLIGHT_FAILED` | A required capability is unavailable |

/// Type-safe process exit code.
///
/// ```rust
/// use relumen_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(3), ExitCode::JOBS_FAILED);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - every job succeeded (or nothing to do)
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid or missing command-line arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Jobs failed - all batches ran but at least one job failed
    pub const JOBS_FAILED: ExitCode = ExitCode(3);

    /// Enumeration failed - input directory could not be turned into jobs
    pub const ENUMERATION_FAILED: ExitCode = ExitCode(4);

    /// Pre-flight failed - a stage program or worker executable is unavailable
    /// (matches `EX_UNAVAILABLE` from sysexits.h)
    pub const PREFLIGHT_FAILED: ExitCode = ExitCode(69);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::JOBS_FAILED.as_i32(), 3);
        assert_eq!(ExitCode::ENUMERATION_FAILED.as_i32(), 4);
        assert_eq!(ExitCode::PREFLIGHT_FAILED.as_i32(), 69);
    }

    #[test]
    fn test_conversions() {
        let code: ExitCode = 2.into();
        assert_eq!(code, ExitCode::CLI_ARGS);
        let raw: i32 = ExitCode::JOBS_FAILED.into();
        assert_eq!(raw, 3);
        assert!(ExitCode::SUCCESS.is_success());
        assert!(!ExitCode::INTERNAL.is_success());
    }
}
