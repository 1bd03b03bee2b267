//! Process launching for relumen stage commands
//!
//! The orchestrator never talks to `std::process` directly. Every external
//! program (the decomposition command, the enhancement command, and worker
//! subprocesses) is described by a [`CommandSpec`] and executed through a
//! [`ProcessRunner`], which gives the core a single capability seam that tests
//! replace with in-process fakes.
//!
//! # Security Model
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style invocation.
//! Arguments are passed as discrete elements rather than shell strings, so file names
//! containing spaces or shell metacharacters reach the stage commands verbatim.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
