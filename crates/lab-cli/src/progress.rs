use std::io::{self, Write};

use lab_exp::{ProgressReporter, RunOutcome, RunProgress, RunRecord, RunStart};

/// Terminal reporter: run headers and log paths on stdout, a progress line
/// rewritten in place on stderr.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    line_open: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn run_started(&mut self, run: &RunStart<'_>) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "\nConfiguration {} of {}", run.index + 1, run.total);
        for name in run.variable {
            if let Some(value) = run.assignment.get(name) {
                let _ = writeln!(out, "  {name}: {value}");
            }
        }
        let _ = writeln!(out, "stdout: {}", run.stdout.display());
        let _ = writeln!(out, "stderr: {}", run.stderr.display());
        let _ = out.flush();
    }

    fn poll(&mut self, progress: &RunProgress) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{}", progress_line(progress));
        let _ = err.flush();
        self.line_open = true;
    }

    fn run_finished(&mut self, record: &RunRecord) {
        let lead = if std::mem::take(&mut self.line_open) { "\n" } else { "" };
        eprintln!("{lead}{}", outcome_line(&record.outcome));
    }
}

fn progress_line(progress: &RunProgress) -> String {
    format!(
        "  Elapsed time is {} seconds.  {} bytes written on stdout and {} bytes on stderr",
        progress.elapsed.as_secs(),
        progress.stdout_bytes,
        progress.stderr_bytes
    )
}

fn outcome_line(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Exited { code: 0 } => "done".to_string(),
        RunOutcome::Exited { code } => format!("exited with return code {code}"),
        RunOutcome::Terminated { signal: Some(signal) } => format!("terminated by signal {signal}"),
        RunOutcome::Terminated { signal: None } => "terminated".to_string(),
        RunOutcome::LaunchFailed { reason } => format!("could not be started: {reason}"),
    }
}
