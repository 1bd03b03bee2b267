use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

// ============================================================================
// CommandSpec - argv-style command description
// ============================================================================

/// Specification for a stage command to execute.
///
/// Stage commands are rendered from configuration templates into a `CommandSpec`,
/// one argument per element. Nothing is ever joined into a shell string.
///
/// # Example
///
/// ```rust
/// use relumen_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("python3")
///     .arg("image_processor.py")
///     .arg("--original_image")
///     .arg("inputs/a photo.png")
///     .cwd("/opt/bell2014");
///
/// assert_eq!(cmd.program, OsString::from("python3"));
/// assert_eq!(cmd.args.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Optional environment overrides
    pub env: Option<HashMap<OsString, OsString>>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` for the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: None,
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable for the command.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Program name as a lossy string, for logs and error messages.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Human-readable rendering of the full command line.
    ///
    /// Only meant for logging. Arguments containing whitespace are quoted so the
    /// boundaries stay visible; the result is never handed to a shell.
    #[must_use]
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build a `std::process::Command` using argv-style argument passing.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        if let Some(ref env) = self.env {
            for (key, value) in env {
                cmd.env(key, value);
            }
        }

        cmd
    }
}

fn quote_for_display(part: &OsStr) -> String {
    let text = part.to_string_lossy();
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        format!("'{text}'")
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_new() {
        let cmd = CommandSpec::new("python3");
        assert_eq!(cmd.program, OsString::from("python3"));
        assert!(cmd.args.is_empty());
        assert!(cmd.cwd.is_none());
        assert!(cmd.env.is_none());
    }

    #[test]
    fn test_command_spec_builder_chain() {
        let cmd = CommandSpec::new("python3")
            .arg("decompose.py")
            .args(["--quiet", "in/a.png"])
            .cwd("/opt/bell2014")
            .env("OMP_NUM_THREADS", "1");

        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.args[2], OsString::from("in/a.png"));
        assert_eq!(cmd.cwd, Some(PathBuf::from("/opt/bell2014")));
        let env = cmd.env.as_ref().unwrap();
        assert_eq!(
            env.get(&OsString::from("OMP_NUM_THREADS")),
            Some(&OsString::from("1"))
        );
    }

    #[test]
    fn test_shell_metacharacters_stay_literal() {
        let cmd = CommandSpec::new("decompose")
            .arg("photo; rm -rf ~.png")
            .arg("$(whoami).png");

        assert_eq!(cmd.args[0], OsString::from("photo; rm -rf ~.png"));
        assert_eq!(cmd.args[1], OsString::from("$(whoami).png"));
    }

    #[test]
    fn test_display_line_quotes_whitespace() {
        let cmd = CommandSpec::new("python3")
            .arg("decompose.py")
            .arg("my photo.png")
            .arg("");
        assert_eq!(cmd.display_line(), "python3 decompose.py 'my photo.png' ''");
    }

    #[test]
    fn test_program_name() {
        let cmd = CommandSpec::new("/usr/bin/python3");
        assert_eq!(cmd.program_name(), "/usr/bin/python3");
    }

    #[test]
    fn test_default_is_empty() {
        let cmd = CommandSpec::default();
        assert!(cmd.program.is_empty());
        assert!(cmd.args.is_empty());
    }
}
