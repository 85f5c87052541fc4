//! Sweep driver: plan every fatal check, then execute runs in order.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use indexmap::IndexMap;
use lab_core::errors::LabError;
use lab_core::VcsProvenance;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Configuration, ParamValue};
use crate::naming::{classify, plan_run_names, timestamp, ParamClasses};
use crate::provenance::{self, Vcs};
use crate::rundir::{config_digest, ExpInfoHeader, ExpInfoWriter, SweepLayout};
use crate::runner::{
    build_invocation, execute, ProgressReporter, RunRecord, RunStart, DEFAULT_POLL_INTERVAL,
    STDERR_FILE, STDOUT_FILE,
};
use crate::sweep::{combinations, expand_axes, Assignment};

/// Driver settings threaded explicitly instead of read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
    /// Directory under which `<name>/<timestamp>` is created.
    pub log_root: PathBuf,
    /// Delay between completion checks of a running child.
    pub poll_interval: Duration,
    /// Overrides the wall-clock timestamp of the sweep root.
    pub stamp: Option<String>,
}

impl SweepOptions {
    /// Options rooted at `log_root` with the default poll interval.
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stamp: None,
        }
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Everything decided before the filesystem is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    /// Output tree of the sweep.
    pub layout: SweepLayout,
    /// Resolved program launched for every run.
    pub executable: PathBuf,
    /// Recorded commit, if the configuration declares a repository.
    pub provenance: Option<VcsProvenance>,
    /// Variable and fixed parameter names.
    pub classes: ParamClasses,
    /// File parameters and their paths relative to each run directory.
    pub file_params: Vec<(String, PathBuf)>,
    /// Assignments in execution order.
    pub assignments: Vec<Assignment>,
    /// Directory name of each assignment, index for index.
    pub run_names: Vec<String>,
}

impl SweepPlan {
    /// Values of the fixed parameters, taken from the first assignment.
    pub fn fixed_values(&self) -> IndexMap<String, ParamValue> {
        let Some(first) = self.assignments.first() else {
            return IndexMap::new();
        };
        self.classes
            .fixed
            .iter()
            .filter_map(|name| first.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// `<log_root>/<name>/<stamp>`.
    pub root: PathBuf,
    /// Program every run launched.
    pub executable: PathBuf,
    /// Commit recorded before the first run.
    pub provenance: Option<VcsProvenance>,
    /// One record per assignment, in execution order.
    pub runs: Vec<RunRecord>,
}

impl SweepReport {
    /// Runs that exited with code `0`.
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|run| run.outcome.is_success()).count()
    }

    /// Runs that exited non-zero, were killed, or never started.
    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }
}

/// Performs every fatal check of a sweep without creating anything on disk:
/// output collision, provenance, range expansion and run naming.
pub fn plan_sweep(
    config: &Configuration,
    options: &SweepOptions,
    vcs: &dyn Vcs,
) -> Result<SweepPlan, LabError> {
    let stamp = options
        .stamp
        .clone()
        .unwrap_or_else(|| timestamp(&Local::now()));
    let layout = SweepLayout::new(&options.log_root, &config.name, stamp);
    info!(output_dir = %layout.root().display(), "planning sweep");
    layout.ensure_vacant()?;

    let provenance = provenance::record(config, vcs)?;
    let axes = expand_axes(config)?;
    let assignments = combinations(&axes);
    let classes = classify(&config.params);
    let run_names = plan_run_names(&assignments, &classes.variable)?;

    Ok(SweepPlan {
        layout,
        executable: config.resolve_executable()?,
        provenance,
        classes,
        file_params: config.file_params(),
        assignments,
        run_names,
    })
}

/// Creates the sweep layout and runs every assignment in order.
///
/// A run that fails or cannot be launched is recorded and the next one
/// starts. The completion marker is written only after the last run.
pub fn execute_plan(
    config: &Configuration,
    plan: &SweepPlan,
    options: &SweepOptions,
    reporter: &mut dyn ProgressReporter,
) -> Result<SweepReport, LabError> {
    let root = plan.layout.create(&config.text)?;
    let header = ExpInfoHeader {
        vcs: plan.provenance.clone(),
        executable: plan.executable.display().to_string(),
        config_sha256: config_digest(&config.text),
        fixed_params: plan.fixed_values(),
    };
    let exp_info = ExpInfoWriter::create(&root, &header)?;
    info!(fixed_params = ?header.fixed_params, runs = plan.assignments.len(), "sweep started");

    let total = plan.assignments.len();
    let mut runs = Vec::with_capacity(total);
    for (index, (assignment, name)) in plan.assignments.iter().zip(&plan.run_names).enumerate() {
        let dir = plan.layout.create_run_dir(name, &plan.file_params)?;
        let stdout = dir.join(STDOUT_FILE);
        let stderr = dir.join(STDERR_FILE);
        reporter.run_started(&RunStart {
            index,
            total,
            name,
            assignment,
            variable: &plan.classes.variable,
            stdout: &stdout,
            stderr: &stderr,
        });

        let invocation = build_invocation(&plan.executable, assignment, &dir, &plan.file_params);
        debug!(index, command = %invocation.display(), "starting run");
        let outcome = execute(&invocation, &stdout, &stderr, options.poll_interval, reporter)?;
        let record = RunRecord {
            index,
            name: name.clone(),
            dir,
            stdout,
            stderr,
            assignment: assignment.clone(),
            outcome,
        };
        reporter.run_finished(&record);
        if record.outcome.is_success() {
            debug!(index, run = %name, "run finished");
        } else {
            warn!(index, run = %name, outcome = ?record.outcome, "run did not succeed; continuing");
        }
        runs.push(record);
    }

    exp_info.finish()?;
    let report = SweepReport {
        root,
        executable: plan.executable.clone(),
        provenance: plan.provenance.clone(),
        runs,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "sweep completed"
    );
    Ok(report)
}

/// Plans and executes a sweep.
pub fn run_sweep(
    config: &Configuration,
    options: &SweepOptions,
    vcs: &dyn Vcs,
    reporter: &mut dyn ProgressReporter,
) -> Result<SweepReport, LabError> {
    let plan = plan_sweep(config, options, vcs)?;
    execute_plan(config, &plan, options, reporter)
}
