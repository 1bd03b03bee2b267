use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use relumen_runner::RunnerError;

use crate::exit_codes::ExitCode;

/// Library-level error type for everything that can abort a run.
///
/// Only run-aborting conditions are represented here. Failures of an individual
/// job are never errors: the worker converts them into a `WorkerOutcome` and the
/// run continues.
///
/// | Category | Exit code |
/// |----------|-----------|
/// | `Config` | 2 |
/// | `Enumeration` | 4 |
/// | `Preflight` | 69 |
/// | `Runner`, `Io`, `Runtime` | 1 |
///
/// ```rust
/// use relumen_utils::error::{ConfigError, RelumenError};
/// use relumen_utils::exit_codes::ExitCode;
///
/// let err = RelumenError::Config(ConfigError::InvalidValue {
///     key: "max_parallel".to_string(),
///     value: "0".to_string(),
/// });
/// assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
/// assert!(err.display_for_user().contains("Suggestions:"));
/// ```
#[derive(Error, Debug)]
pub enum RelumenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input enumeration error: {0}")]
    Enumeration(#[from] EnumerationError),

    #[error("Pre-flight check failed: {0}")]
    Preflight(#[from] PreflightError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {reason}")]
    Runtime { reason: String },
}

/// Configuration errors: bad TOML, bad values, bad command templates.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Unknown placeholder '{{{placeholder}}}' in {command} command arguments")]
    UnknownPlaceholder {
        command: String,
        placeholder: String,
    },
}

/// Errors listing the input directory. All of them abort the run.
#[derive(Error, Debug)]
pub enum EnumerationError {
    #[error("Input directory does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Input path is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Input directory is not readable: {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error(
        "Inputs {} and {} share the base name '{base_name}'",
        .first.display(),
        .second.display()
    )]
    DuplicateBaseName {
        base_name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Pre-flight failures: the run cannot start.
#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("{} capability check(s) failed: {}", .failures.len(), .failures.join("; "))]
    CapabilityUnavailable { failures: Vec<String> },

    #[error("Cannot prepare directory {}: {reason}", .path.display())]
    DirectoryUnavailable { path: PathBuf, reason: String },
}

/// User-facing rendering of an error: message, context, suggestions.
pub trait UserFriendlyError {
    fn user_message(&self) -> String;

    fn context(&self) -> Option<String>;

    fn suggestions(&self) -> Vec<String>;

    fn category(&self) -> ErrorCategory;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Environment,
    Execution,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Input => write!(f, "Input"),
            Self::Environment => write!(f, "Environment"),
            Self::Execution => write!(f, "Execution"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::MissingRequired(key) => format!("Required configuration '{key}' is missing"),
            Self::UnknownPlaceholder {
                command,
                placeholder,
            } => format!("The {command} command uses an unknown placeholder '{{{placeholder}}}'"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::UnknownPlaceholder { .. } => Some(
                "Command arguments are rendered per job before the command is launched"
                    .to_string(),
            ),
            _ => Some("Configuration is read from CLI flags, then .relumen/config.toml".to_string()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .relumen/config.toml".to_string(),
                "Only [run], [naming], [enumeration] and [commands.*] sections are recognised"
                    .to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use discovery and built-in defaults".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "max_parallel" => vec!["Use a positive integer, e.g. 8".to_string()],
                "launch_mode" => vec!["Use 'in_process' or 'subprocess'".to_string()],
                k if k.ends_with("timeout_secs") => {
                    vec!["Use a positive number of seconds".to_string()]
                }
                _ => vec!["Check the documentation for valid values".to_string()],
            },
            Self::MissingRequired(key) => vec![format!(
                "Set '{key}' in .relumen/config.toml or pass it on the command line"
            )],
            Self::UnknownPlaceholder { .. } => vec![
                "Valid placeholders: {input}, {base}, {reflectance}, {shading}, {output_dir}"
                    .to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for EnumerationError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Jobs are the regular files directly under the input directory".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } | Self::NotADirectory { .. } => {
                vec!["Pass an existing directory as <INPUT_DIR>".to_string()]
            }
            Self::Unreadable { .. } => {
                vec!["Check the permissions of the input directory".to_string()]
            }
            Self::DuplicateBaseName { .. } => vec![
                "Rename one of the inputs; intermediate artifacts are keyed by base name"
                    .to_string(),
                "Or restrict [enumeration] extensions to a single image type".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Input
    }
}

impl UserFriendlyError for PreflightError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Pre-flight checks run once, before any batch is launched".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::CapabilityUnavailable { .. } => vec![
                "Run 'relumen doctor' for the full list of checks".to_string(),
                "Set [commands.decompose] and [commands.process] program paths".to_string(),
            ],
            Self::DirectoryUnavailable { .. } => {
                vec!["Check that the parent directory exists and is writable".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Environment
    }
}

impl RelumenError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Enumeration(e) => e.user_message(),
            Self::Preflight(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Enumeration(e) => e.context(),
            Self::Preflight(e) => e.context(),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Enumeration(e) => e.suggestions(),
            Self::Preflight(e) => e.suggestions(),
            Self::Runner(_) | Self::Io(_) | Self::Runtime { .. } => {
                vec!["Re-run with --verbose for details".to_string()]
            }
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Enumeration(e) => e.category(),
            Self::Preflight(e) => e.category(),
            Self::Runner(_) | Self::Runtime { .. } => ErrorCategory::Execution,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }

    /// Error message with context and actionable suggestions, for stderr.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to its CLI exit code. Single source of truth for the table
    /// in [`exit_codes`](crate::exit_codes).
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Enumeration(_) => ExitCode::ENUMERATION_FAILED,
            Self::Preflight(_) => ExitCode::PREFLIGHT_FAILED,
            Self::Runner(_) | Self::Io(_) | Self::Runtime { .. } => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let config = RelumenError::Config(ConfigError::MissingRequired("input_dir".into()));
        assert_eq!(config.to_exit_code(), ExitCode::CLI_ARGS);

        let enumeration = RelumenError::Enumeration(EnumerationError::NotFound {
            path: PathBuf::from("/nope"),
        });
        assert_eq!(enumeration.to_exit_code(), ExitCode::ENUMERATION_FAILED);

        let preflight = RelumenError::Preflight(PreflightError::CapabilityUnavailable {
            failures: vec!["decompose_program: python3 not found in PATH".into()],
        });
        assert_eq!(preflight.to_exit_code(), ExitCode::PREFLIGHT_FAILED);

        let io = RelumenError::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.to_exit_code(), ExitCode::INTERNAL);
    }

    #[test]
    fn test_duplicate_base_name_message_names_both_files() {
        let err = EnumerationError::DuplicateBaseName {
            base_name: "cat".to_string(),
            first: PathBuf::from("in/cat.jpg"),
            second: PathBuf::from("in/cat.png"),
        };
        let message = err.to_string();
        assert!(message.contains("in/cat.jpg"));
        assert!(message.contains("in/cat.png"));
        assert!(message.contains("'cat'"));
    }

    #[test]
    fn test_unknown_placeholder_display() {
        let err = ConfigError::UnknownPlaceholder {
            command: "process".to_string(),
            placeholder: "outdir".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown placeholder '{outdir}' in process command arguments"
        );
    }

    #[test]
    fn test_display_for_user_includes_context_and_suggestions() {
        let err = RelumenError::Preflight(PreflightError::CapabilityUnavailable {
            failures: vec!["process_program: enhance not found in PATH".into()],
        });
        let rendered = err.display_for_user();
        assert!(rendered.starts_with("Error: 1 capability check(s) failed"));
        assert!(rendered.contains("Context:"));
        assert!(rendered.contains("relumen doctor"));
        assert_eq!(err.category(), ErrorCategory::Environment);
    }
}
