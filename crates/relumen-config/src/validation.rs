use relumen_utils::error::ConfigError;

use crate::model::{Config, OUTPUT_ROLE_NAMES, StageCommand};
use crate::template::{Placeholder, check_placeholders};

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

fn validate_extension(key: &str, ext: &str) -> Result<(), ConfigError> {
    if ext.is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    if ext.starts_with('.') || ext.contains(['/', '\\']) {
        return Err(invalid(
            key,
            format!("'{ext}' must be a bare extension such as 'png'"),
        ));
    }
    Ok(())
}

fn validate_command(
    name: &str,
    command: &StageCommand,
    allowed: &[Placeholder],
) -> Result<(), ConfigError> {
    if command.program.trim().is_empty() {
        return Err(ConfigError::MissingRequired(format!(
            "commands.{name}.program"
        )));
    }
    if command.timeout_secs == 0 {
        return Err(invalid(
            &format!("commands.{name}.timeout_secs"),
            "must be greater than 0",
        ));
    }
    check_placeholders(name, &command.args, allowed)
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.max_parallel == 0 {
            return Err(invalid("max_parallel", "must be greater than 0"));
        }

        validate_extension("naming.extension", &self.naming.extension)?;
        for (role, ext) in &self.naming.output_extensions {
            if !OUTPUT_ROLE_NAMES.contains(&role.as_str()) {
                return Err(invalid(
                    "naming.output_extensions",
                    format!(
                        "unknown output role '{role}' (expected one of {})",
                        OUTPUT_ROLE_NAMES.join(", ")
                    ),
                ));
            }
            validate_extension(&format!("naming.output_extensions.{role}"), ext)?;
        }

        for ext in &self.enumeration.extensions {
            validate_extension("enumeration.extensions", ext)?;
        }

        validate_command("decompose", &self.commands.decompose, Placeholder::DECOMPOSE)?;
        validate_command("process", &self.commands.process, Placeholder::PROCESS)?;

        Ok(())
    }
}
