use std::collections::HashMap;

use relumen_utils::error::ConfigError;

use crate::model::{Config, ConfigSource, LaunchMode, StageCommand};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// ```rust
    /// use relumen_config::{Config, LaunchMode, StageCommand};
    ///
    /// let config = Config::builder()
    ///     .max_parallel(4)
    ///     .launch_mode(LaunchMode::InProcess)
    ///     .decompose_command(StageCommand::new("decompose", &["{input}"], 60))
    ///     .output_extension("brightened", "jpg")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.run.max_parallel, 4);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent construction of a [`Config`] without config files or CLI parsing.
///
/// Every value set here is attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    max_parallel: Option<usize>,
    launch_mode: Option<LaunchMode>,
    extension: Option<String>,
    output_extensions: Vec<(String, String)>,
    input_extensions: Option<Vec<String>>,
    include_hidden: Option<bool>,
    decompose: Option<StageCommand>,
    process: Option<StageCommand>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    #[must_use]
    pub fn launch_mode(mut self, mode: LaunchMode) -> Self {
        self.launch_mode = Some(mode);
        self
    }

    /// Extension used for decomposition artifacts and outputs without an override.
    #[must_use]
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    #[must_use]
    pub fn output_extension(mut self, role: impl Into<String>, ext: impl Into<String>) -> Self {
        self.output_extensions.push((role.into(), ext.into()));
        self
    }

    /// Restrict enumeration to these extensions (case-insensitive).
    #[must_use]
    pub fn input_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_extensions = Some(exts.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = Some(include);
        self
    }

    #[must_use]
    pub fn decompose_command(mut self, command: StageCommand) -> Self {
        self.decompose = Some(command);
        self
    }

    #[must_use]
    pub fn process_command(mut self, command: StageCommand) -> Self {
        self.process = Some(command);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let mut attribution = HashMap::new();
        let source = ConfigSource::Programmatic;

        if let Some(max_parallel) = self.max_parallel {
            config.run.max_parallel = max_parallel;
            attribution.insert("max_parallel".to_string(), source.clone());
        }
        if let Some(mode) = self.launch_mode {
            config.run.launch_mode = mode;
            attribution.insert("launch_mode".to_string(), source.clone());
        }
        if let Some(ext) = self.extension {
            config.naming.extension = ext;
            attribution.insert("extension".to_string(), source.clone());
        }
        if !self.output_extensions.is_empty() {
            config.naming.output_extensions.extend(self.output_extensions);
            attribution.insert("output_extensions".to_string(), source.clone());
        }
        if let Some(exts) = self.input_extensions {
            config.enumeration.extensions = exts;
            attribution.insert("enumeration.extensions".to_string(), source.clone());
        }
        if let Some(include_hidden) = self.include_hidden {
            config.enumeration.include_hidden = include_hidden;
            attribution.insert("include_hidden".to_string(), source.clone());
        }
        if let Some(decompose) = self.decompose {
            config.commands.decompose = decompose;
            attribution.insert("decompose.program".to_string(), source.clone());
        }
        if let Some(process) = self.process {
            config.commands.process = process;
            attribution.insert("process.program".to_string(), source);
        }

        config.source_attribution = attribution;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.run.max_parallel, 8);
        assert_eq!(config.naming.extension, "png");
        assert!(config.source_attribution.is_empty());
    }

    #[test]
    fn test_builder_sets_values_with_programmatic_source() {
        let config = Config::builder()
            .max_parallel(2)
            .launch_mode(LaunchMode::Subprocess)
            .input_extensions(["png", "JPG"])
            .include_hidden(true)
            .process_command(StageCommand::new("enhance", &["{input}", "{output_dir}"], 30))
            .build()
            .unwrap();

        assert_eq!(config.run.max_parallel, 2);
        assert_eq!(config.run.launch_mode, LaunchMode::Subprocess);
        assert_eq!(config.enumeration.extensions, vec!["png", "JPG"]);
        assert!(config.enumeration.include_hidden);
        assert_eq!(config.commands.process.program, "enhance");
        assert_eq!(config.source_of("max_parallel"), ConfigSource::Programmatic);
        assert_eq!(config.source_of("extension"), ConfigSource::Defaults);
    }

    #[test]
    fn test_builder_validates() {
        assert!(Config::builder().max_parallel(0).build().is_err());
        assert!(
            Config::builder()
                .decompose_command(StageCommand::new("d", &["{shading}"], 10))
                .build()
                .is_err()
        );
    }
}
