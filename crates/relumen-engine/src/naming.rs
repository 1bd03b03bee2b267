//! Artifact naming scheme
//!
//! Pure mapping from (job, stage, role) to a file path. Nothing here touches
//! the filesystem.
//!
//! | Artifact | Path |
//! |----------|------|
//! | decomposition | `<input_dir>/<base>-r.<ext>`, `<input_dir>/<base>-s.<ext>` |
//! | intermediate | `<intermediate_dir>/<base>-r.<ext>`, `<intermediate_dir>/<base>-s.<ext>` |
//! | output | `<output_dir>/<base>-<role>.<ext>` |
//! | organized | `<output_dir>/<role>/<base>-<role>.<ext>` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use relumen_config::NamingConfig;

use crate::jobs::Job;

/// The two artifacts produced by decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecompositionRole {
    Reflectance,
    Shading,
}

impl DecompositionRole {
    pub const ALL: [DecompositionRole; 2] = [Self::Reflectance, Self::Shading];

    /// File-name suffix: `r` or `s`
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Reflectance => "r",
            Self::Shading => "s",
        }
    }
}

impl fmt::Display for DecompositionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reflectance => write!(f, "reflectance"),
            Self::Shading => write!(f, "shading"),
        }
    }
}

/// The named results of the processing stage. Each one is organized into a
/// subdirectory of the output root named after the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    Brightened,
    Enhanced,
    Reconstructed,
}

impl OutputRole {
    pub const ALL: [OutputRole; 3] = [Self::Brightened, Self::Enhanced, Self::Reconstructed];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brightened => "brightened",
            Self::Enhanced => "enhanced",
            Self::Reconstructed => "reconstructed",
        }
    }
}

impl fmt::Display for OutputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension policy for every artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    extension: String,
    brightened: String,
    enhanced: String,
    reconstructed: String,
}

impl Default for NamingScheme {
    fn default() -> Self {
        Self::from_config(&NamingConfig::default())
    }
}

impl NamingScheme {
    #[must_use]
    pub fn from_config(config: &NamingConfig) -> Self {
        Self {
            extension: config.extension.clone(),
            brightened: config.extension_for(OutputRole::Brightened.as_str()).to_string(),
            enhanced: config.extension_for(OutputRole::Enhanced.as_str()).to_string(),
            reconstructed: config
                .extension_for(OutputRole::Reconstructed.as_str())
                .to_string(),
        }
    }

    /// Extension of decomposition and intermediate artifacts.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn output_extension(&self, role: OutputRole) -> &str {
        match role {
            OutputRole::Brightened => &self.brightened,
            OutputRole::Enhanced => &self.enhanced,
            OutputRole::Reconstructed => &self.reconstructed,
        }
    }

    fn decomposition_file_name(&self, base: &str, role: DecompositionRole) -> String {
        format!("{base}-{}.{}", role.suffix(), self.extension)
    }

    fn output_file_name(&self, base: &str, role: OutputRole) -> String {
        format!("{base}-{role}.{}", self.output_extension(role))
    }

    /// Where the decomposition command writes `role`, next to the input.
    #[must_use]
    pub fn decomposition_artifact(&self, job: &Job, role: DecompositionRole) -> PathBuf {
        job.input_dir
            .join(self.decomposition_file_name(&job.base_name, role))
    }

    /// Where `role` lives after relocation out of the input directory.
    #[must_use]
    pub fn intermediate_artifact(&self, job: &Job, role: DecompositionRole) -> PathBuf {
        job.intermediate_dir
            .join(self.decomposition_file_name(&job.base_name, role))
    }

    /// Where the processing command writes `role`, directly under the output root.
    #[must_use]
    pub fn output_artifact(&self, job: &Job, role: OutputRole) -> PathBuf {
        job.output_dir.join(self.output_file_name(&job.base_name, role))
    }

    /// Final location of `role` after organization.
    #[must_use]
    pub fn organized_artifact(&self, job: &Job, role: OutputRole) -> PathBuf {
        output_subdir(&job.output_dir, role).join(self.output_file_name(&job.base_name, role))
    }
}

/// `<output_dir>/<role>`
#[must_use]
pub fn output_subdir(output_dir: &Path, role: OutputRole) -> PathBuf {
    output_dir.join(role.as_str())
}
