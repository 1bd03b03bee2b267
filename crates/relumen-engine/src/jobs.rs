//! Job enumeration and batch slicing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use relumen_config::EnumerationConfig;
use relumen_utils::error::EnumerationError;
use tracing::{debug, warn};

/// One input image and the directories its pipeline writes to.
///
/// Immutable once enumerated; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Input file name without its extension
    pub base_name: String,
    pub input_path: PathBuf,
    pub input_dir: PathBuf,
    pub intermediate_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Job {
    #[must_use]
    pub fn new(
        input_path: PathBuf,
        base_name: String,
        intermediate_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        let input_dir = match input_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            base_name,
            input_path,
            input_dir,
            intermediate_dir,
            output_dir,
        }
    }

    /// Build a job for a single input file, deriving the base name from its
    /// file stem. `None` when the path has no UTF-8 file stem.
    #[must_use]
    pub fn from_input(input_path: &Path, intermediate_dir: &Path, output_dir: &Path) -> Option<Self> {
        let base_name = base_name_of(input_path)?;
        Some(Self::new(
            input_path.to_path_buf(),
            base_name,
            intermediate_dir.to_path_buf(),
            output_dir.to_path_buf(),
        ))
    }

    /// File name of the input, used to identify the job in reports.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .map_or_else(|| self.base_name.clone(), |n| n.to_string_lossy().into_owned())
    }
}

fn base_name_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// The ordered jobs of one run.
///
/// Restartable: [`JobSet::iter`] can be called any number of times and always
/// yields the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSet {
    jobs: Vec<Job>,
}

impl JobSet {
    #[must_use]
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.jobs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Job] {
        &self.jobs
    }

    /// Consecutive batches of at most `max_parallel` jobs.
    #[must_use]
    pub fn batches(&self, max_parallel: usize) -> Vec<Batch> {
        plan_batches(&self.jobs, max_parallel)
    }
}

impl<'a> IntoIterator for &'a JobSet {
    type Item = &'a Job;
    type IntoIter = std::slice::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A consecutive slice of the job sequence, launched concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    /// Zero-based position in the run
    pub index: usize,
    pub jobs: Vec<Job>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Slice `jobs` in order into batches of `max_parallel` (the last may be
/// smaller). A `max_parallel` of zero is treated as one.
#[must_use]
pub fn plan_batches(jobs: &[Job], max_parallel: usize) -> Vec<Batch> {
    jobs.chunks(max_parallel.max(1))
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            jobs: chunk.to_vec(),
        })
        .collect()
}

fn is_hidden(name: &OsString) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn extension_allowed(path: &Path, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// List the regular files directly under `input_dir` as jobs, sorted by file name.
///
/// Identical directory contents always yield the same sequence, so batch
/// partitioning is reproducible across runs. Directories and other
/// non-regular entries are skipped; there is no recursion.
pub fn enumerate_jobs(
    input_dir: &Path,
    intermediate_dir: &Path,
    output_dir: &Path,
    config: &EnumerationConfig,
) -> Result<JobSet, EnumerationError> {
    let metadata = fs::metadata(input_dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EnumerationError::NotFound {
                path: input_dir.to_path_buf(),
            }
        } else {
            EnumerationError::Unreadable {
                path: input_dir.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;
    if !metadata.is_dir() {
        return Err(EnumerationError::NotADirectory {
            path: input_dir.to_path_buf(),
        });
    }

    let unreadable = |e: std::io::Error| EnumerationError::Unreadable {
        path: input_dir.to_path_buf(),
        reason: e.to_string(),
    };

    let mut entries: Vec<(OsString, PathBuf)> = Vec::new();
    for entry in fs::read_dir(input_dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        let name = entry.file_name();

        if !config.include_hidden && is_hidden(&name) {
            continue;
        }
        // Follows symlinks, so a link to a regular file counts as one
        if !fs::metadata(&path).is_ok_and(|m| m.is_file()) {
            continue;
        }
        if !extension_allowed(&path, &config.extensions) {
            debug!(path = %path.display(), "Skipping input with unlisted extension");
            continue;
        }
        entries.push((name, path));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(entries.len());
    for (_, path) in entries {
        let Some(job) = Job::from_input(&path, intermediate_dir, output_dir) else {
            warn!(path = %path.display(), "Skipping input without a usable base name");
            continue;
        };
        if let Some(first) = seen.get(&job.base_name) {
            return Err(EnumerationError::DuplicateBaseName {
                base_name: job.base_name,
                first: first.clone(),
                second: path,
            });
        }
        seen.insert(job.base_name.clone(), path);
        jobs.push(job);
    }

    debug!(input_dir = %input_dir.display(), jobs = jobs.len(), "Enumerated jobs");
    Ok(JobSet::from_jobs(jobs))
}
