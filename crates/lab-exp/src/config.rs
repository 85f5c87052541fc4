//! YAML sweep configuration: parsing and validation.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use lab_core::errors::{ErrorInfo, LabError};
use lab_core::VcsKind;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::naming::sweep_name;

/// File name reserved for sweep metadata; configurations may not use it.
pub const EXP_INFO_FILE: &str = "exp_info.yaml";

/// One concrete parameter value passed to the executable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Whole number.
    Int(i64),
    /// Floating point number; integral values render with a trailing `.0`.
    Float(f64),
    /// `true` or `false`.
    Bool(bool),
    /// Any other scalar, passed through verbatim.
    Str(String),
}

impl ParamValue {
    /// Converts a scalar YAML node into a value; sequences, mappings and nulls are rejected.
    pub fn from_yaml(param: &str, value: &Value) -> Result<Self, LabError> {
        match value {
            Value::Number(number) => Ok(match number.as_i64() {
                Some(int) => ParamValue::Int(int),
                None => ParamValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::Bool(flag) => Ok(ParamValue::Bool(*flag)),
            Value::String(text) => Ok(ParamValue::Str(text.clone())),
            Value::Tagged(tagged) => Self::from_yaml(param, &tagged.value),
            other => Err(LabError::Config(
                ErrorInfo::new(
                    "config.param_value",
                    format!("unsupported value {other:?} for parameter"),
                )
                .with_context("param", param)
                .with_hint("use a number, boolean or string"),
            )),
        }
    }

    /// Returns the numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(value) => Some(*value as f64),
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{value}"),
            // Integral floats keep a trailing `.0` so `2.0` never renders like the integer `2`.
            ParamValue::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Str(value) => f.write_str(value),
        }
    }
}

/// Numeric range descriptor; `max` is validated when the range is expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    /// First value, `0` when omitted.
    pub min: ParamValue,
    /// Inclusive upper bound; required.
    pub max: Option<ParamValue>,
    /// Positive increment, `1` when omitted.
    pub step: ParamValue,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self {
            min: ParamValue::Int(0),
            max: None,
            step: ParamValue::Int(1),
        }
    }
}

/// Declared shape of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSpec {
    /// A single fixed value.
    Scalar(ParamValue),
    /// Explicit ordered values.
    List(Vec<ParamValue>),
    /// `min`/`max`/`step` numeric range.
    Range(RangeSpec),
    /// Path resolved against each run's output directory.
    File {
        /// Location inside the run directory.
        relative_path: PathBuf,
    },
}

impl ParameterSpec {
    /// Parses the YAML node declared for `param`.
    pub fn from_yaml(param: &str, value: &Value) -> Result<Self, LabError> {
        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| ParamValue::from_yaml(param, item))
                .collect::<Result<Vec<_>, _>>()
                .map(ParameterSpec::List),
            Value::Mapping(mapping) => {
                if let Some(path) = mapping.get("relative_path") {
                    return parse_file_param(param, path);
                }
                let mut range = RangeSpec::default();
                for (key, entry) in mapping {
                    match key.as_str() {
                        Some("min") => range.min = numeric(param, "min", entry)?,
                        Some("max") => range.max = Some(numeric(param, "max", entry)?),
                        Some("step") => range.step = numeric(param, "step", entry)?,
                        _ => {
                            return Err(LabError::Config(
                                ErrorInfo::new(
                                    "config.range_key",
                                    format!("unknown range key {key:?}"),
                                )
                                .with_context("param", param)
                                .with_hint("ranges accept `min`, `max` and `step`"),
                            ))
                        }
                    }
                }
                Ok(ParameterSpec::Range(range))
            }
            scalar => ParamValue::from_yaml(param, scalar).map(ParameterSpec::Scalar),
        }
    }

    /// Lists and ranges span an axis of the sweep; scalars and file parameters do not.
    pub fn is_variable(&self) -> bool {
        matches!(self, ParameterSpec::List(_) | ParameterSpec::Range(_))
    }

    /// True for parameters resolved per run directory.
    pub fn is_file(&self) -> bool {
        matches!(self, ParameterSpec::File { .. })
    }
}

fn numeric(param: &str, field: &str, value: &Value) -> Result<ParamValue, LabError> {
    match ParamValue::from_yaml(param, value)? {
        parsed @ (ParamValue::Int(_) | ParamValue::Float(_)) => Ok(parsed),
        other => Err(LabError::Config(
            ErrorInfo::new(
                "config.range_numeric",
                format!("range field `{field}` must be numeric, got `{other}`"),
            )
            .with_context("param", param)
            .with_context("field", field),
        )),
    }
}

fn parse_file_param(param: &str, value: &Value) -> Result<ParameterSpec, LabError> {
    let Some(text) = value.as_str() else {
        return Err(LabError::Config(
            ErrorInfo::new("config.file_param", "`relative_path` must be a string")
                .with_context("param", param),
        ));
    };
    let relative_path = PathBuf::from(text);
    let escapes = relative_path
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if text.is_empty() || escapes {
        return Err(LabError::Config(
            ErrorInfo::new(
                "config.file_param",
                format!("`{text}` is not a path inside the run directory"),
            )
            .with_context("param", param)
            .with_hint("use a relative path without `..`"),
        ));
    }
    Ok(ParameterSpec::File { relative_path })
}

/// Version-control descriptor declared by a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsSpec {
    /// Version-control system, only `git` for now.
    #[serde(rename = "type")]
    pub kind: VcsKind,
    /// Repository directory relative to the configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    executable: Option<String>,
    #[serde(default)]
    params: IndexMap<String, Value>,
    #[serde(default)]
    vcs: Option<VcsSpec>,
}

/// Validated sweep configuration. Read once and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Sweep name; the file stem unless `name` is declared.
    pub name: String,
    /// Executable exactly as declared, relative to the configuration directory.
    pub executable: PathBuf,
    /// Parameters in declaration order.
    pub params: IndexMap<String, ParameterSpec>,
    /// Repository whose commit is recorded, when declared.
    pub vcs: Option<VcsSpec>,
    /// Path the configuration was read from.
    pub path: PathBuf,
    /// Verbatim configuration text.
    pub text: String,
}

impl Configuration {
    /// Reads and validates the configuration stored at `path`.
    pub fn load(path: &Path) -> Result<Self, LabError> {
        let text = fs::read_to_string(path).map_err(|err| {
            LabError::Config(ErrorInfo::new("config.read", err.to_string()).with_path(path))
        })?;
        Self::parse(&text, path)
    }

    /// Validates configuration `text` as if it had been read from `path`.
    pub fn parse(text: &str, path: &Path) -> Result<Self, LabError> {
        if path.file_name().and_then(|name| name.to_str()) == Some(EXP_INFO_FILE) {
            return Err(LabError::Config(
                ErrorInfo::new(
                    "config.reserved_name",
                    format!("{EXP_INFO_FILE} is reserved for sweep metadata"),
                )
                .with_path(path)
                .with_hint("rename the configuration file"),
            ));
        }
        let raw: RawConfig = serde_yaml::from_str(text).map_err(|err| {
            LabError::Config(ErrorInfo::new("config.parse", err.to_string()).with_path(path))
        })?;

        let executable = match raw.executable {
            Some(exe) if !exe.trim().is_empty() => PathBuf::from(exe),
            _ => {
                return Err(LabError::Config(
                    ErrorInfo::new("config.executable", "missing `executable`")
                        .with_path(path)
                        .with_context("field", "executable"),
                ))
            }
        };
        let name = match raw.name.or_else(|| sweep_name(path)) {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                return Err(LabError::Config(
                    ErrorInfo::new("config.name", "cannot derive a sweep name")
                        .with_path(path)
                        .with_context("field", "name"),
                ))
            }
        };
        let mut params = IndexMap::with_capacity(raw.params.len());
        for (param, value) in &raw.params {
            let spec = ParameterSpec::from_yaml(param, value)
                .map_err(|err| attach_path(err, path))?;
            params.insert(param.clone(), spec);
        }

        Ok(Self {
            name,
            executable,
            params,
            vcs: raw.vcs,
            path: path.to_path_buf(),
            text: text.to_string(),
        })
    }

    /// Absolute directory containing the configuration file.
    pub fn config_dir(&self) -> Result<PathBuf, LabError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new(""));
        if parent.is_absolute() {
            return Ok(parent.to_path_buf());
        }
        let cwd = env::current_dir().map_err(|err| LabError::io("config.cwd", parent, err))?;
        Ok(cwd.join(parent))
    }

    /// Resolves the executable against the configuration directory.
    ///
    /// A bare command name that does not exist next to the configuration is
    /// looked up on `PATH`. When that lookup fails too the name is returned as
    /// written and the launch failure is recorded per run.
    pub fn resolve_executable(&self) -> Result<PathBuf, LabError> {
        let joined = self.config_dir()?.join(&self.executable);
        let bare = self.executable.components().count() == 1
            && !self.executable.is_absolute();
        if bare && !joined.exists() {
            Ok(search_path(&self.executable).unwrap_or_else(|| self.executable.clone()))
        } else {
            Ok(joined)
        }
    }

    /// Repository directory queried for provenance, when a `vcs` block is present.
    pub fn repo_dir(&self) -> Result<Option<PathBuf>, LabError> {
        let Some(vcs) = &self.vcs else {
            return Ok(None);
        };
        let dir = self.config_dir()?;
        Ok(Some(match &vcs.path {
            Some(path) => dir.join(path),
            None => dir,
        }))
    }

    /// File parameters with their relative paths, in declaration order.
    pub fn file_params(&self) -> Vec<(String, PathBuf)> {
        self.params
            .iter()
            .filter_map(|(name, spec)| match spec {
                ParameterSpec::File { relative_path } => Some((name.clone(), relative_path.clone())),
                _ => None,
            })
            .collect()
    }
}

fn attach_path(err: LabError, path: &Path) -> LabError {
    match err {
        LabError::Config(info) => LabError::Config(info.with_path(path)),
        other => other,
    }
}

/// First executable file named `name` in the directories of `PATH`.
fn search_path(name: &Path) -> Option<PathBuf> {
    let dirs = env::var_os("PATH")?;
    env::split_paths(&dirs)
        .filter(|dir| dir.is_absolute())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
