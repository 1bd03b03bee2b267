//! Filesystem layout and a scripted fake pipeline for engine tests
//!
//! The fake stands in for both stage commands. It identifies the stage by
//! program name (`decompose` or `process`) and writes the files a real
//! command would, unless a [`Behavior`] for the job says otherwise.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relumen_config::{CommandsConfig, StageCommand};
use relumen_runner::{CommandSpec, ProcessOutput, ProcessRunner, RunnerError};
use tempfile::TempDir;

use crate::jobs::{Job, JobSet};
use crate::naming::{NamingScheme, OutputRole, output_subdir};
use crate::worker::Worker;

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    DecomposeWritesNothing,
    DecomposeWritesOnlyReflectance,
    DecomposeExits(i32),
    DecomposeCannotLaunch,
    ProcessExits(i32),
    ProcessTimesOut,
    ProcessWrites(Vec<OutputRole>),
    Panics,
}

#[derive(Default)]
struct PipelineState {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<Vec<String>>>,
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    process_calls: AtomicUsize,
    delay: Duration,
}

/// Scripted stand-in for the decomposition and processing commands.
#[derive(Clone, Default)]
pub(crate) struct FakePipeline {
    state: Arc<PipelineState>,
}

impl FakePipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut PipelineState {
        Arc::get_mut(&mut self.state).expect("configure the pipeline before sharing it")
    }

    pub(crate) fn with(mut self, base: &str, behavior: Behavior) -> Self {
        self.state_mut()
            .behaviors
            .insert(base.to_string(), behavior);
        self
    }

    /// Every stage command sleeps this long, so batch members overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.state_mut().delay = delay;
        self
    }

    /// argv of every call, program first
    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.state.calls.lock().unwrap().clone()
    }

    pub(crate) fn process_calls(&self) -> usize {
        self.state.process_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Shared event log; the pipeline appends `launch:<base>` on decomposition.
    pub(crate) fn record(&self, event: String) {
        self.state.events.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }

    fn behavior(&self, base: &str) -> Option<&Behavior> {
        self.state.behaviors.get(base)
    }

    fn decompose(&self, input: &Path) -> Result<ProcessOutput, RunnerError> {
        let base = stem(input);
        self.record(format!("launch:{base}"));
        let dir = input.parent().unwrap();

        match self.behavior(&base) {
            Some(Behavior::DecomposeWritesNothing) => Ok(ProcessOutput::exited(0)),
            Some(Behavior::DecomposeWritesOnlyReflectance) => {
                fs::write(dir.join(format!("{base}-r.png")), b"r").unwrap();
                Ok(ProcessOutput::exited(0))
            }
            Some(Behavior::DecomposeExits(code)) => Ok(ProcessOutput::new(
                Vec::new(),
                b"Traceback\nValueError: bad image\n".to_vec(),
                Some(*code),
            )),
            Some(Behavior::DecomposeCannotLaunch) => Err(RunnerError::LaunchFailed {
                program: "decompose".to_string(),
                reason: "No such file or directory".to_string(),
            }),
            Some(Behavior::Panics) => panic!("decomposition fake panicked for {base}"),
            _ => {
                fs::write(dir.join(format!("{base}-r.png")), b"r").unwrap();
                fs::write(dir.join(format!("{base}-s.png")), b"s").unwrap();
                Ok(ProcessOutput::exited(0))
            }
        }
    }

    fn process(&self, input: &Path, output_dir: &Path) -> Result<ProcessOutput, RunnerError> {
        self.state.process_calls.fetch_add(1, Ordering::SeqCst);
        let base = stem(input);

        let roles = match self.behavior(&base) {
            Some(Behavior::ProcessExits(code)) => return Ok(ProcessOutput::exited(*code)),
            Some(Behavior::ProcessTimesOut) => {
                return Err(RunnerError::Timeout {
                    program: "process".to_string(),
                    timeout_seconds: 5,
                });
            }
            Some(Behavior::ProcessWrites(roles)) => roles.clone(),
            _ => OutputRole::ALL.to_vec(),
        };
        for role in roles {
            fs::write(output_dir.join(format!("{base}-{role}.png")), b"out").unwrap();
        }
        Ok(ProcessOutput::exited(0))
    }
}

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().into_owned()
}

impl ProcessRunner for FakePipeline {
    fn run(&self, cmd: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let argv: Vec<String> = std::iter::once(&cmd.program)
            .chain(cmd.args.iter())
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.state.calls.lock().unwrap().push(argv.clone());

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.state.delay.is_zero() {
            std::thread::sleep(self.state.delay);
        }

        let result = match argv[0].as_str() {
            "decompose" => self.decompose(Path::new(&argv[1])),
            "process" => self.process(Path::new(&argv[1]), Path::new(&argv[4])),
            other => panic!("unexpected program {other}"),
        };

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Commands the fake pipeline understands
pub(crate) fn fake_commands() -> CommandsConfig {
    CommandsConfig {
        decompose: StageCommand::new("decompose", &["{input}"], 5),
        process: StageCommand::new(
            "process",
            &["{input}", "{reflectance}", "{shading}", "{output_dir}"],
            5,
        ),
    }
}

/// Temporary input, intermediate and output trees with the output role
/// subdirectories already created.
pub(crate) struct Layout {
    _temp: TempDir,
    pub(crate) input: PathBuf,
    pub(crate) intermediate: PathBuf,
    pub(crate) output: PathBuf,
}

impl Layout {
    pub(crate) fn new(inputs: &[&str]) -> Self {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let intermediate = temp.path().join("mid");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&intermediate).unwrap();
        for role in OutputRole::ALL {
            fs::create_dir_all(output_subdir(&output, role)).unwrap();
        }
        for name in inputs {
            fs::write(input.join(name), b"img").unwrap();
        }
        Self {
            _temp: temp,
            input,
            intermediate,
            output,
        }
    }

    pub(crate) fn job(&self, base: &str) -> Job {
        Job::from_input(
            &self.input.join(format!("{base}.png")),
            &self.intermediate,
            &self.output,
        )
        .unwrap()
    }

    pub(crate) fn jobs(&self, bases: &[&str]) -> JobSet {
        JobSet::from_jobs(bases.iter().map(|b| self.job(b)).collect())
    }

    pub(crate) fn worker(&self, pipeline: &FakePipeline) -> Worker {
        Worker::new(
            Arc::new(pipeline.clone()),
            NamingScheme::default(),
            fake_commands(),
        )
    }
}
