//! Run and sweep naming.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, TimeZone};
use indexmap::IndexMap;
use lab_core::errors::{ErrorInfo, LabError};

use crate::config::ParameterSpec;
use crate::sweep::Assignment;

/// Suffix appended to every run directory name.
pub const RUN_SUFFIX: &str = "_out";
/// Second-resolution layout of sweep timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Parameter names split by role, each in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamClasses {
    /// Lists and ranges; these name the run directories.
    pub variable: Vec<String>,
    /// Scalars; recorded once in the sweep metadata.
    pub fixed: Vec<String>,
}

/// Classifies parameters by declared kind. File parameters belong to neither class.
pub fn classify(params: &IndexMap<String, ParameterSpec>) -> ParamClasses {
    let mut classes = ParamClasses::default();
    for (name, spec) in params {
        match spec {
            ParameterSpec::File { .. } => {}
            spec if spec.is_variable() => classes.variable.push(name.clone()),
            _ => classes.fixed.push(name.clone()),
        }
    }
    classes
}

/// Joins the variable parameters' values with `_` and appends [`RUN_SUFFIX`].
pub fn run_name(assignment: &Assignment, variable: &[String]) -> String {
    let prefix = variable
        .iter()
        .map(|name| {
            assignment
                .get(name)
                .map(|value| value.to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("_");
    format!("{prefix}{RUN_SUFFIX}")
}

/// Names every assignment, rejecting names that are not a single path
/// component and names shared by two assignments.
pub fn plan_run_names(
    assignments: &[Assignment],
    variable: &[String],
) -> Result<Vec<String>, LabError> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut names = Vec::with_capacity(assignments.len());
    for (idx, assignment) in assignments.iter().enumerate() {
        let name = run_name(assignment, variable);
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(LabError::Config(
                ErrorInfo::new(
                    "naming.invalid_run_name",
                    format!("run name `{name}` is not a valid directory name"),
                )
                .with_context("run", idx.to_string())
                .with_hint("parameter values used in run names cannot contain path separators"),
            ));
        }
        if let Some(previous) = seen.insert(name.clone(), idx) {
            return Err(LabError::Config(
                ErrorInfo::new(
                    "naming.collision",
                    format!("runs {previous} and {idx} share the directory name `{name}`"),
                )
                .with_context("name", name)
                .with_hint("avoid `_` inside string values of variable parameters"),
            ));
        }
        names.push(name);
    }
    Ok(names)
}

/// Sweep name derived from the configuration file name, without its extension.
pub fn sweep_name(config_path: &Path) -> Option<String> {
    config_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// Formats `at` as a sweep directory timestamp.
pub fn timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}
