//! Placeholder substitution for stage command arguments
//!
//! Arguments are argv elements, never shell strings. Each `{name}` in an
//! argument is replaced by the corresponding path; `{{` and `}}` produce literal
//! braces. Substitution works on `OsString` so non-UTF-8 paths survive intact.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use relumen_runner::CommandSpec;
use relumen_utils::error::ConfigError;

use crate::model::StageCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// Original input image
    Input,
    /// Directory holding the input image
    InputDir,
    /// Job base name (file name without extension)
    Base,
    /// Relocated reflectance artifact
    Reflectance,
    /// Relocated shading artifact
    Shading,
    /// Output root
    OutputDir,
}

impl Placeholder {
    /// Placeholders meaningful to the decomposition command
    pub const DECOMPOSE: &'static [Placeholder] = &[Self::Input, Self::InputDir, Self::Base];

    /// Placeholders meaningful to the processing command
    pub const PROCESS: &'static [Placeholder] = &[
        Self::Input,
        Self::InputDir,
        Self::Base,
        Self::Reflectance,
        Self::Shading,
        Self::OutputDir,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "input" => Some(Self::Input),
            "input_dir" => Some(Self::InputDir),
            "base" => Some(Self::Base),
            "reflectance" => Some(Self::Reflectance),
            "shading" => Some(Self::Shading),
            "output_dir" => Some(Self::OutputDir),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::InputDir => "input_dir",
            Self::Base => "base",
            Self::Reflectance => "reflectance",
            Self::Shading => "shading",
            Self::OutputDir => "output_dir",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

/// Values available for substitution. Stage-specific values are optional.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub input: PathBuf,
    pub input_dir: PathBuf,
    pub base: String,
    pub reflectance: Option<PathBuf>,
    pub shading: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl TemplateVars {
    fn value(&self, placeholder: Placeholder) -> Option<&OsStr> {
        match placeholder {
            Placeholder::Input => Some(self.input.as_os_str()),
            Placeholder::InputDir => Some(self.input_dir.as_os_str()),
            Placeholder::Base => Some(OsStr::new(self.base.as_str())),
            Placeholder::Reflectance => self.reflectance.as_deref().map(Path::as_os_str),
            Placeholder::Shading => self.shading.as_deref().map(Path::as_os_str),
            Placeholder::OutputDir => self.output_dir.as_deref().map(Path::as_os_str),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

fn parse_segments(arg: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = arg;

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("{{") {
            segments.push(Segment::Brace('{'));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("}}") {
            segments.push(Segment::Brace('}'));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('{') {
            match tail.find('}') {
                Some(end) => {
                    segments.push(Segment::Placeholder(&tail[..end]));
                    rest = &tail[end + 1..];
                }
                // Unterminated brace is literal text
                None => {
                    segments.push(Segment::Literal(rest));
                    rest = "";
                }
            }
        } else {
            let end = rest
                .find(['{', '}'])
                .map_or(rest.len(), |i| if i == 0 { 1 } else { i });
            segments.push(Segment::Literal(&rest[..end]));
            rest = &rest[end..];
        }
    }

    segments
}

/// Reject any placeholder in `args` outside `allowed`.
pub fn check_placeholders(
    command: &str,
    args: &[String],
    allowed: &[Placeholder],
) -> Result<(), ConfigError> {
    for arg in args {
        for segment in parse_segments(arg) {
            if let Segment::Placeholder(name) = segment {
                let known = Placeholder::from_name(name).is_some_and(|p| allowed.contains(&p));
                if !known {
                    return Err(ConfigError::UnknownPlaceholder {
                        command: command.to_string(),
                        placeholder: name.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn render_arg(command: &str, arg: &str, vars: &TemplateVars) -> Result<OsString, ConfigError> {
    let mut out = OsString::new();
    for segment in parse_segments(arg) {
        match segment {
            Segment::Literal(text) => out.push(text),
            Segment::Brace(c) => out.push(c.to_string()),
            Segment::Placeholder(name) => {
                let value = Placeholder::from_name(name).and_then(|p| vars.value(p));
                match value {
                    Some(value) => out.push(value),
                    None => {
                        return Err(ConfigError::UnknownPlaceholder {
                            command: command.to_string(),
                            placeholder: name.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(out)
}

impl StageCommand {
    /// Substitute `vars` into the argument template and build an argv command.
    ///
    /// `command` names the stage in error messages.
    pub fn render(&self, command: &str, vars: &TemplateVars) -> Result<CommandSpec, ConfigError> {
        let args = self
            .args
            .iter()
            .map(|arg| render_arg(command, arg, vars))
            .collect::<Result<Vec<_>, _>>()?;

        let mut spec = CommandSpec::new(&self.program).args(args);
        if let Some(cwd) = &self.cwd {
            spec = spec.cwd(cwd);
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars {
            input: PathBuf::from("/in/a.png"),
            input_dir: PathBuf::from("/in"),
            base: "a".to_string(),
            reflectance: Some(PathBuf::from("/mid/a-r.png")),
            shading: Some(PathBuf::from("/mid/a-s.png")),
            output_dir: Some(PathBuf::from("/out")),
        }
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            parse_segments("--x={input}.bak"),
            vec![
                Segment::Literal("--x="),
                Segment::Placeholder("input"),
                Segment::Literal(".bak"),
            ]
        );
        assert_eq!(
            parse_segments("{{literal}}"),
            vec![
                Segment::Brace('{'),
                Segment::Literal("literal"),
                Segment::Brace('}'),
            ]
        );
        assert_eq!(parse_segments("open{"), vec![Segment::Literal("open"), Segment::Literal("{")]);
    }

    #[test]
    fn test_render_process_command() {
        let cmd = StageCommand::default_process();
        let spec = cmd.render("process", &vars()).unwrap();

        assert_eq!(spec.program, OsString::from("python3"));
        let args: Vec<String> = spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "image_processor.py",
                "--original_image",
                "/in/a.png",
                "--reflectance_image",
                "/mid/a-r.png",
                "--shading_image",
                "/mid/a-s.png",
                "--output_dir",
                "/out",
            ]
        );
    }

    #[test]
    fn test_render_keeps_metacharacters_as_single_argument() {
        let cmd = StageCommand::new("tool", &["{base} && rm -rf /"], 5);
        let spec = cmd.render("decompose", &vars()).unwrap();
        assert_eq!(spec.args, vec![OsString::from("a && rm -rf /")]);
    }

    #[test]
    fn test_render_sets_cwd() {
        let mut cmd = StageCommand::new("tool", &[], 5);
        cmd.cwd = Some(PathBuf::from("/opt/pipeline"));
        let spec = cmd.render("decompose", &vars()).unwrap();
        assert_eq!(spec.cwd, Some(PathBuf::from("/opt/pipeline")));
    }

    #[test]
    fn test_render_rejects_value_missing_for_stage() {
        let cmd = StageCommand::new("tool", &["{reflectance}"], 5);
        let decompose_vars = TemplateVars {
            reflectance: None,
            ..vars()
        };
        let err = cmd.render("decompose", &decompose_vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownPlaceholder { ref placeholder, .. } if placeholder == "reflectance"
        ));
    }

    #[test]
    fn test_check_placeholders_per_stage() {
        let args = vec!["{input}".to_string(), "{shading}".to_string()];
        assert!(check_placeholders("process", &args, Placeholder::PROCESS).is_ok());
        assert!(check_placeholders("decompose", &args, Placeholder::DECOMPOSE).is_err());

        let typo = vec!["{inptu}".to_string()];
        let err = check_placeholders("process", &typo, Placeholder::PROCESS).unwrap_err();
        assert!(err.to_string().contains("{inptu}"));
    }
}
