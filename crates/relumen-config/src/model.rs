use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default number of jobs launched concurrently per batch
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Default timeout for the decomposition command (30 minutes)
pub const DEFAULT_DECOMPOSE_TIMEOUT_SECS: u64 = 1800;

/// Default timeout for the processing command (10 minutes)
pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 600;

/// Output roles accepted as keys of `naming.output_extensions`
pub const OUTPUT_ROLE_NAMES: [&str; 3] = ["brightened", "enhanced", "reconstructed"];

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    ConfigFile(PathBuf),
    Programmatic,
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// How the scheduler launches one worker per job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Blocking task on the async runtime; stage commands are still child processes
    #[default]
    InProcess,
    /// Re-invoke the current executable in worker mode
    Subprocess,
}

impl LaunchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProcess => "in_process",
            Self::Subprocess => "subprocess",
        }
    }
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_process" | "in-process" => Ok(Self::InProcess),
            "subprocess" => Ok(Self::Subprocess),
            other => Err(format!(
                "unknown launch mode '{other}' (expected 'in_process' or 'subprocess')"
            )),
        }
    }
}

/// `[run]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub max_parallel: usize,
    pub launch_mode: LaunchMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            launch_mode: LaunchMode::default(),
        }
    }
}

/// `[naming]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingConfig {
    /// Extension of decomposition artifacts and of outputs without an override
    pub extension: String,
    /// Per-output-role extension overrides, keyed by role name
    pub output_extensions: BTreeMap<String, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            extension: "png".to_string(),
            output_extensions: BTreeMap::new(),
        }
    }
}

impl NamingConfig {
    /// Extension for an output role, falling back to the shared extension.
    #[must_use]
    pub fn extension_for(&self, role: &str) -> &str {
        self.output_extensions
            .get(role)
            .map_or(self.extension.as_str(), String::as_str)
    }
}

/// `[enumeration]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnumerationConfig {
    /// Case-insensitive extension allow-list; empty admits every regular file
    pub extensions: Vec<String>,
    pub include_hidden: bool,
}

/// One external stage command: program, templated argv, working directory, timeout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl StageCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            cwd: None,
            timeout_secs,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `python3 decompose.py {input}`
    #[must_use]
    pub fn default_decompose() -> Self {
        Self::new(
            "python3",
            &["decompose.py", "{input}"],
            DEFAULT_DECOMPOSE_TIMEOUT_SECS,
        )
    }

    /// `python3 image_processor.py --original_image {input} ...`
    #[must_use]
    pub fn default_process() -> Self {
        Self::new(
            "python3",
            &[
                "image_processor.py",
                "--original_image",
                "{input}",
                "--reflectance_image",
                "{reflectance}",
                "--shading_image",
                "{shading}",
                "--output_dir",
                "{output_dir}",
            ],
            DEFAULT_PROCESS_TIMEOUT_SECS,
        )
    }
}

/// `[commands]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandsConfig {
    pub decompose: StageCommand,
    pub process: StageCommand,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            decompose: StageCommand::default_decompose(),
            process: StageCommand::default_process(),
        }
    }
}

/// CLI overrides fed into [`Config::discover`]
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub max_parallel: Option<usize>,
    pub launch_mode: Option<LaunchMode>,
}

/// Effective configuration for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunConfig,
    pub naming: NamingConfig,
    pub enumeration: EnumerationConfig,
    pub commands: CommandsConfig,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            naming: NamingConfig::default(),
            enumeration: EnumerationConfig::default(),
            commands: CommandsConfig::default(),
            config_path: None,
            source_attribution: HashMap::new(),
        }
    }
}

impl Config {
    /// Source of a setting, `Defaults` when nothing overrode it.
    #[must_use]
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .cloned()
            .unwrap_or(ConfigSource::Defaults)
    }
}
