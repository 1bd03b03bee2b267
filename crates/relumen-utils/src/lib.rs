//! Foundation utilities shared by the relumen crates
//!
//! - [`error`]: the library error type and the per-concern error enums
//! - [`exit_codes`]: the documented CLI exit code table
//! - [`logging`]: tracing initialization and job/stage logging helpers
//! - [`fs_ops`]: file relocation with a cross-filesystem fallback

pub mod error;
pub mod exit_codes;
pub mod fs_ops;
pub mod logging;

pub use error::{ConfigError, EnumerationError, PreflightError, RelumenError};
pub use exit_codes::ExitCode;
