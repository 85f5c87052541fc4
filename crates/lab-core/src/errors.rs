//! Structured error types shared across the lab crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context carried by every [`LabError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Dotted identifier such as `config.range_step`.
    pub code: String,
    /// Diagnostic shown to the operator.
    pub message: String,
    /// Contextual key value pairs (offending path, parameter, field).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the operator fix the configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with an empty context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records `key=value` in the context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Adds a `path` context entry rendered from a filesystem path.
    pub fn with_path(self, path: &Path) -> Self {
        self.with_context("path", path.display().to_string())
    }

    /// Suggests how to fix the input.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for sweep generation and orchestration.
///
/// Every variant is fatal for the sweep. A child process exiting with a
/// non-zero code is not an error; it is recorded as a run outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum LabError {
    /// Malformed configuration, missing fields or invalid parameter ranges.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Dirty working tree or a failed version-control query.
    #[error("provenance error: {0}")]
    Provenance(ErrorInfo),
    /// The sweep output directory already exists.
    #[error("output collision: {0}")]
    OutputCollision(ErrorInfo),
    /// Filesystem failures while laying out or writing sweep artefacts.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " | context: [{}]", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, " | hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl LabError {
    /// Payload shared by all variants.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LabError::Config(info)
            | LabError::Provenance(info)
            | LabError::OutputCollision(info)
            | LabError::Io(info) => info,
        }
    }

    /// Wraps an I/O failure on `path` under the given error code.
    pub fn io(code: &str, path: &Path, err: impl ToString) -> Self {
        LabError::Io(ErrorInfo::new(code, err.to_string()).with_path(path))
    }
}
