use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use relumen_utils::error::ConfigError;

use crate::model::{CliArgs, Config, ConfigSource, LaunchMode, StageCommand};

/// Config file location relative to a project directory
const CONFIG_DIR: &str = ".relumen";
const CONFIG_FILE: &str = "config.toml";

/// TOML configuration file structure; every field optional so files can be partial
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    run: Option<TomlRun>,
    naming: Option<TomlNaming>,
    enumeration: Option<TomlEnumeration>,
    commands: Option<TomlCommands>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRun {
    max_parallel: Option<usize>,
    launch_mode: Option<LaunchMode>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlNaming {
    extension: Option<String>,
    output_extensions: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlEnumeration {
    extensions: Option<Vec<String>>,
    include_hidden: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlCommands {
    decompose: Option<TomlStageCommand>,
    process: Option<TomlStageCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlStageCommand {
    program: Option<String>,
    args: Option<Vec<String>>,
    cwd: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl TomlStageCommand {
    fn apply(
        self,
        target: &mut StageCommand,
        prefix: &str,
        source: &ConfigSource,
        attribution: &mut HashMap<String, ConfigSource>,
    ) {
        if let Some(program) = self.program {
            target.program = program;
            attribution.insert(format!("{prefix}.program"), source.clone());
        }
        if let Some(args) = self.args {
            target.args = args;
            attribution.insert(format!("{prefix}.args"), source.clone());
        }
        if let Some(cwd) = self.cwd {
            target.cwd = Some(cwd);
            attribution.insert(format!("{prefix}.cwd"), source.clone());
        }
        if let Some(timeout_secs) = self.timeout_secs {
            target.timeout_secs = timeout_secs;
            attribution.insert(format!("{prefix}.timeout_secs"), source.clone());
        }
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is given in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| {
            ConfigError::InvalidFile(format!("Failed to get current directory: {e}"))
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Path-driven variant of [`Config::discover`], free of process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config, ConfigSource::ConfigFile(path.clone()));
            config.config_path = Some(path.clone());
        }

        // CLI overrides
        if let Some(max_parallel) = cli_args.max_parallel {
            config.run.max_parallel = max_parallel;
            config
                .source_attribution
                .insert("max_parallel".to_string(), ConfigSource::Cli);
        }
        if let Some(launch_mode) = cli_args.launch_mode {
            config.run.launch_mode = launch_mode;
            config
                .source_attribution
                .insert("launch_mode".to_string(), ConfigSource::Cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.relumen/config.toml`, stopping at
    /// a repository root (.git, .hg, .svn) or the filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }
            current = dir.parent();
        }

        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("Failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }

    fn apply_file(&mut self, file: TomlConfig, source: ConfigSource) {
        let attribution = &mut self.source_attribution;

        if let Some(run) = file.run {
            if let Some(max_parallel) = run.max_parallel {
                self.run.max_parallel = max_parallel;
                attribution.insert("max_parallel".to_string(), source.clone());
            }
            if let Some(launch_mode) = run.launch_mode {
                self.run.launch_mode = launch_mode;
                attribution.insert("launch_mode".to_string(), source.clone());
            }
        }

        if let Some(naming) = file.naming {
            if let Some(extension) = naming.extension {
                self.naming.extension = extension;
                attribution.insert("extension".to_string(), source.clone());
            }
            if let Some(output_extensions) = naming.output_extensions {
                self.naming.output_extensions = output_extensions;
                attribution.insert("output_extensions".to_string(), source.clone());
            }
        }

        if let Some(enumeration) = file.enumeration {
            if let Some(extensions) = enumeration.extensions {
                self.enumeration.extensions = extensions;
                attribution.insert("enumeration.extensions".to_string(), source.clone());
            }
            if let Some(include_hidden) = enumeration.include_hidden {
                self.enumeration.include_hidden = include_hidden;
                attribution.insert("include_hidden".to_string(), source.clone());
            }
        }

        if let Some(commands) = file.commands {
            if let Some(decompose) = commands.decompose {
                decompose.apply(
                    &mut self.commands.decompose,
                    "decompose",
                    &source,
                    attribution,
                );
            }
            if let Some(process) = commands.process {
                process.apply(&mut self.commands.process, "process", &source, attribution);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();
        assert_eq!(config.run.max_parallel, 8);
        assert_eq!(config.run.launch_mode, LaunchMode::InProcess);
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_discovers_config_in_parent_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let path = write_config(temp.path(), "[run]\nmax_parallel = 3\n");
        let nested = temp.path().join("photos").join("batch1");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default()).unwrap();
        assert_eq!(config.run.max_parallel, 3);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.source_of("max_parallel"),
            ConfigSource::ConfigFile(path)
        );
    }

    #[test]
    fn test_discovery_stops_at_repository_root() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[run]\nmax_parallel = 3\n");
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();

        assert!(Config::discover_config_file_from(&repo).is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            "[run]\nmax_parallel = 3\nlaunch_mode = \"subprocess\"\n",
        );

        let cli = CliArgs {
            max_parallel: Some(5),
            ..CliArgs::default()
        };
        let config = Config::discover_from(temp.path(), &cli).unwrap();
        assert_eq!(config.run.max_parallel, 5);
        assert_eq!(config.run.launch_mode, LaunchMode::Subprocess);
        assert_eq!(config.source_of("max_parallel"), ConfigSource::Cli);
    }

    #[test]
    fn test_partial_command_override_keeps_other_fields() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            r#"
[naming]
output_extensions = { brightened = "jpg" }

[commands.decompose]
program = "/opt/bell2014/decompose"
timeout_secs = 60
"#,
        );

        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();
        assert_eq!(config.commands.decompose.program, "/opt/bell2014/decompose");
        assert_eq!(config.commands.decompose.args, vec!["decompose.py", "{input}"]);
        assert_eq!(config.commands.decompose.timeout_secs, 60);
        assert_eq!(config.naming.extension_for("brightened"), "jpg");
    }

    #[test]
    fn test_explicit_missing_config_is_not_found() {
        let temp = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err = Config::discover_from(temp.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_toml_and_unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(temp.path(), "[run]\nmax_paralel = 3\n");

        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)));
    }

    #[test]
    fn test_file_values_are_validated() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        write_config(
            temp.path(),
            "[commands.process]\nargs = [\"{input}\", \"{mask}\"]\n",
        );

        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlaceholder { .. }));
    }
}
