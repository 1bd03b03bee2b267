use crate::error::RunnerError;
use std::io::Read;
use std::process::{Child, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use super::{CommandSpec, ProcessOutput, ProcessRunner};

/// Upper bound on how long an exit goes unnoticed
const POLL_INTERVAL: Duration = Duration::from_millis(25);

// ============================================================================
// NativeRunner - direct subprocess execution
// ============================================================================

/// Process runner backed by `std::process::Command`.
///
/// Stdin is closed, stdout and stderr are captured on reader threads. The
/// child is started in its own process group (a Job Object on Windows) and
/// polled until it exits or the timeout passes; on timeout the whole tree is
/// killed, so helpers forked by a stage command do not outlive it.
///
/// The `Child` is only reaped by this thread, after any kill, so a signal can
/// never reach a recycled PID.
///
/// ```rust,no_run
/// use relumen_runner::{CommandSpec, NativeRunner, ProcessRunner};
/// use std::time::Duration;
///
/// let runner = NativeRunner::new();
/// let cmd = CommandSpec::new("python3").arg("decompose.py").arg("inputs/a.png");
/// let output = runner.run(&cmd, Duration::from_secs(1800)).unwrap();
/// assert!(output.success());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner;

impl NativeRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessRunner for NativeRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let program = cmd.program_name();
        let deadline = Instant::now() + timeout;

        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| RunnerError::LaunchFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        let tree = ProcessTree::attach(&child);

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    tree.kill(&mut child);
                    let _ = child.wait();
                    return Err(RunnerError::WaitFailed {
                        program,
                        reason: e.to_string(),
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tree.kill(&mut child);
                let _ = child.wait();
                // Reader threads finish on their own once the pipes close
                return Err(RunnerError::Timeout {
                    program,
                    timeout_seconds: timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        };

        // A descendant may still hold the pipes open after the leader exits
        let stdout = collect(&stdout, deadline, &tree, &mut child, &program, timeout)?;
        let stderr = collect(&stderr, deadline, &tree, &mut child, &program, timeout)?;

        Ok(ProcessOutput::new(stdout, stderr, status.code()))
    }
}

type PipeResult = std::io::Result<Vec<u8>>;

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<PipeResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}

fn collect(
    reader: &mpsc::Receiver<PipeResult>,
    deadline: Instant,
    tree: &ProcessTree,
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<Vec<u8>, RunnerError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let received = match reader.recv_timeout(remaining) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tree.kill(child);
            return Err(RunnerError::Timeout {
                program: program.to_string(),
                timeout_seconds: timeout.as_secs(),
            });
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            return Err(RunnerError::MonitorLost {
                program: program.to_string(),
            });
        }
    };
    received.map_err(|e| RunnerError::WaitFailed {
        program: program.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// ProcessTree - the child and everything it spawned
// ============================================================================

/// Process group led by the child; its id equals the child's PID.
#[cfg(unix)]
struct ProcessTree {
    pgid: libc::pid_t,
}

#[cfg(unix)]
impl ProcessTree {
    fn attach(child: &Child) -> Self {
        Self {
            pgid: child.id() as libc::pid_t,
        }
    }

    /// SIGKILL the whole group, then the child itself. `Child::kill` is a
    /// no-op once the child has been reaped.
    fn kill(&self, child: &mut Child) {
        unsafe {
            libc::killpg(self.pgid, libc::SIGKILL);
        }
        let _ = child.kill();
    }
}

/// Job Object holding the child; closing it kills every process in the job.
#[cfg(windows)]
struct ProcessTree {
    job: Option<windows::Win32::Foundation::HANDLE>,
}

#[cfg(windows)]
impl ProcessTree {
    fn attach(child: &Child) -> Self {
        use std::os::windows::io::AsRawHandle;
        use windows::Win32::Foundation::{CloseHandle, HANDLE};
        use windows::Win32::System::JobObjects::{
            AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
            JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
            SetInformationJobObject,
        };

        unsafe {
            let Ok(job) = CreateJobObjectW(None, None) else {
                return Self { job: None };
            };

            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = std::mem::zeroed();
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
            let configured = SetInformationJobObject(
                job,
                JobObjectExtendedLimitInformation,
                (&raw const info).cast(),
                std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            );
            let assigned = configured
                .and_then(|()| AssignProcessToJobObject(job, HANDLE(child.as_raw_handle())));

            if assigned.is_ok() {
                Self { job: Some(job) }
            } else {
                let _ = CloseHandle(job);
                Self { job: None }
            }
        }
    }

    fn kill(&self, child: &mut Child) {
        use windows::Win32::System::JobObjects::TerminateJobObject;

        if let Some(job) = self.job {
            unsafe {
                let _ = TerminateJobObject(job, 1);
            }
        }
        let _ = child.kill();
    }
}

#[cfg(windows)]
impl Drop for ProcessTree {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;

        if let Some(job) = self.job.take() {
            unsafe {
                let _ = CloseHandle(job);
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
struct ProcessTree;

#[cfg(not(any(unix, windows)))]
impl ProcessTree {
    fn attach(_child: &Child) -> Self {
        Self
    }

    fn kill(&self, child: &mut Child) {
        let _ = child.kill();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_native_runner_captures_stdout() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("echo").arg("decomposed a.png");

        let output = runner.run(&cmd, Duration::from_secs(10)).unwrap();
        assert!(output.success());
        assert!(output.stdout_string().contains("decomposed a.png"));
    }

    #[test]
    fn test_native_runner_exit_code_propagation() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("sh").arg("-c").arg("echo 'bad input' >&2; exit 42");

        let output = runner.run(&cmd, Duration::from_secs(10)).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(42));
        assert_eq!(output.stderr_tail().as_deref(), Some("bad input"));
    }

    #[test]
    fn test_native_runner_argument_with_metacharacters_is_literal() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("echo").arg("$HOME;ls");

        let output = runner.run(&cmd, Duration::from_secs(10)).unwrap();
        assert_eq!(output.stdout_string().trim(), "$HOME;ls");
    }

    #[test]
    fn test_native_runner_nonexistent_program() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("relumen_missing_program_12345");

        match runner.run(&cmd, Duration::from_secs(10)) {
            Err(RunnerError::LaunchFailed { program, .. }) => {
                assert_eq!(program, "relumen_missing_program_12345");
            }
            other => panic!("Expected LaunchFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_native_runner_timeout_kills_process() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("sleep").arg("5");

        let started = std::time::Instant::now();
        let result = runner.run(&cmd, Duration::from_millis(200));
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_commands_forked_by_a_shell() {
        // sh forks sleep; killing only sh would leave sleep holding the pipes
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("sh").arg("-c").arg("sleep 6; true");

        let started = std::time::Instant::now();
        let result = runner.run(&cmd, Duration::from_millis(200));
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "timeout took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_background_helper_holding_output_is_bounded_by_timeout() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("sh").arg("-c").arg("sleep 6 & echo started");

        let started = std::time::Instant::now();
        let result = runner.run(&cmd, Duration::from_millis(300));
        assert!(matches!(result, Err(RunnerError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_fast_exit_is_not_reported_as_timeout() {
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("sh").arg("-c").arg("echo done; exit 3");

        let output = runner.run(&cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout_string().trim(), "done");
    }

    #[test]
    fn test_native_runner_honours_cwd() {
        let dir = std::env::temp_dir();
        let runner = NativeRunner::new();
        let cmd = CommandSpec::new("pwd").cwd(&dir);

        let output = runner.run(&cmd, Duration::from_secs(10)).unwrap();
        let printed = std::path::PathBuf::from(output.stdout_string().trim());
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.canonicalize().unwrap()
        );
    }
}
