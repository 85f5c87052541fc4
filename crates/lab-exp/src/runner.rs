//! Launching one run and waiting for it to terminate.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lab_core::errors::LabError;
use serde::Serialize;
use tracing::{debug, warn};

use crate::sweep::Assignment;

/// Captured standard output of a run.
pub const STDOUT_FILE: &str = "out.log";
/// Captured standard error of a run.
pub const STDERR_FILE: &str = "err.log";
/// Interval between completion checks of a running child.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Program and flags for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to launch.
    pub program: PathBuf,
    /// `--name=value` flags.
    pub args: Vec<String>,
}

impl Invocation {
    /// Unconfigured [`Command`] for this invocation.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Shell-like rendering used in logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// `executable --name=value ... --file=<run_dir>/<relative_path> ...`
///
/// Non-file parameters come first in assignment order, then file parameters
/// resolved against `run_dir`.
pub fn build_invocation(
    executable: &Path,
    assignment: &Assignment,
    run_dir: &Path,
    file_params: &[(String, PathBuf)],
) -> Invocation {
    let mut args: Vec<String> = assignment
        .iter()
        .map(|(name, value)| format!("--{name}={value}"))
        .collect();
    args.extend(
        file_params
            .iter()
            .map(|(name, relative)| format!("--{name}={}", run_dir.join(relative).display())),
    );
    Invocation {
        program: executable.to_path_buf(),
        args,
    }
}

/// Terminal state of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The child exited on its own.
    Exited {
        /// Exit status reported by the OS.
        code: i32,
    },
    /// The child was killed by a signal and has no exit code.
    Terminated {
        /// Terminating signal, when the platform reports one.
        signal: Option<i32>,
    },
    /// The executable could not be started.
    LaunchFailed {
        /// OS error raised by the spawn.
        reason: String,
    },
}

impl RunOutcome {
    /// Only an exit code of `0` counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Exited { code: 0 })
    }

    /// Exit code, if the child exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunOutcome::Exited { code } => Some(*code),
            _ => None,
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => RunOutcome::Exited { code },
            None => RunOutcome::Terminated {
                signal: exit_signal(status),
            },
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Liveness snapshot taken between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    /// Time since the child was spawned.
    pub elapsed: Duration,
    /// Current size of `out.log`.
    pub stdout_bytes: u64,
    /// Current size of `err.log`.
    pub stderr_bytes: u64,
}

/// Everything known about a run once it reached a terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Position in execution order.
    pub index: usize,
    /// Run directory name.
    pub name: String,
    /// Run directory.
    pub dir: PathBuf,
    /// Captured standard output.
    pub stdout: PathBuf,
    /// Captured standard error.
    pub stderr: PathBuf,
    /// Values passed to the executable.
    pub assignment: Assignment,
    /// Terminal state.
    pub outcome: RunOutcome,
}

/// Identifies the run about to start.
#[derive(Debug, Clone, Copy)]
pub struct RunStart<'a> {
    /// Position in execution order.
    pub index: usize,
    /// Number of runs in the sweep.
    pub total: usize,
    /// Run directory name.
    pub name: &'a str,
    /// Values passed to the executable.
    pub assignment: &'a Assignment,
    /// Names of the parameters that vary across runs.
    pub variable: &'a [String],
    /// Captured standard output.
    pub stdout: &'a Path,
    /// Captured standard error.
    pub stderr: &'a Path,
}

/// Observer of run progress. Reports are informational only and never
/// influence scheduling.
pub trait ProgressReporter {
    /// Called once the run directory exists, before the child is spawned.
    fn run_started(&mut self, _run: &RunStart<'_>) {}
    /// Called on every poll while the child is alive.
    fn poll(&mut self, progress: &RunProgress);
    /// Called after the run reached its terminal outcome.
    fn run_finished(&mut self, _record: &RunRecord) {}
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn poll(&mut self, _progress: &RunProgress) {}
}

/// Launches `invocation` with output redirected to fresh `stdout`/`stderr`
/// files and blocks until the child terminates, polling every `poll_interval`.
///
/// There is no timeout: a child that never exits blocks here forever.
pub fn execute(
    invocation: &Invocation,
    stdout: &Path,
    stderr: &Path,
    poll_interval: Duration,
    reporter: &mut dyn ProgressReporter,
) -> Result<RunOutcome, LabError> {
    let out_file = File::create(stdout).map_err(|err| LabError::io("runner.stdout", stdout, err))?;
    let err_file = File::create(stderr).map_err(|err| LabError::io("runner.stderr", stderr, err))?;

    let mut child = match invocation
        .command()
        .stdin(Stdio::null())
        .stdout(out_file)
        .stderr(err_file)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            warn!(program = %invocation.program.display(), error = %err, "failed to launch");
            return Ok(RunOutcome::LaunchFailed {
                reason: err.to_string(),
            });
        }
    };
    debug!(pid = child.id(), command = %invocation.display(), "launched");

    let start = Instant::now();
    loop {
        let polled = child
            .try_wait()
            .map_err(|err| LabError::io("runner.wait", &invocation.program, err))?;
        if let Some(status) = polled {
            return Ok(RunOutcome::from_status(status));
        }
        reporter.poll(&RunProgress {
            elapsed: start.elapsed(),
            stdout_bytes: file_len(stdout),
            stderr_bytes: file_len(stderr),
        });
        thread::sleep(poll_interval);
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}
