//! Configuration for relumen runs
//!
//! Precedence is CLI arguments > config file > built-in defaults. The config
//! file is `.relumen/config.toml`, discovered upward from the working directory
//! or given explicitly with `--config`.
//!
//! ```toml
//! [run]
//! max_parallel = 4
//! launch_mode = "in_process"   # or "subprocess"
//!
//! [naming]
//! extension = "png"
//! output_extensions = { brightened = "jpg" }
//!
//! [enumeration]
//! extensions = ["png", "jpg"]
//! include_hidden = false
//!
//! [commands.decompose]
//! program = "python3"
//! args = ["decompose.py", "{input}"]
//! cwd = "/opt/bell2014"
//! timeout_secs = 1800
//!
//! [commands.process]
//! program = "python3"
//! args = ["image_processor.py", "--original_image", "{input}",
//!         "--reflectance_image", "{reflectance}", "--shading_image", "{shading}",
//!         "--output_dir", "{output_dir}"]
//! ```

mod builder;
mod discovery;
mod model;
pub mod template;
mod validation;

pub use builder::ConfigBuilder;
pub use model::{
    CliArgs, CommandsConfig, Config, ConfigSource, EnumerationConfig, LaunchMode, NamingConfig,
    RunConfig, StageCommand, DEFAULT_MAX_PARALLEL, OUTPUT_ROLE_NAMES,
};
pub use template::{Placeholder, TemplateVars};
