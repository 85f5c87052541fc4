use std::path::Path;

use lab_core::errors::{ErrorInfo, LabError};
use lab_core::VcsProvenance;

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("param", "alpha")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = LabError::Config(sample_info("config.range_step", "step must be positive"));
    assert_eq!(err.info().code, "config.range_step");
    assert!(err.info().context.contains_key("param"));
}

#[test]
fn provenance_error_surface() {
    let err = LabError::Provenance(sample_info("provenance.dirty", "uncommitted changes"));
    assert_eq!(err.info().code, "provenance.dirty");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn collision_error_surface() {
    let err = LabError::OutputCollision(
        ErrorInfo::new("rundir.exists", "already exists").with_path(Path::new("/tmp/x")),
    );
    assert_eq!(err.info().context.get("path").map(String::as_str), Some("/tmp/x"));
}

#[test]
fn io_helper_records_path() {
    let err = LabError::io("rundir.mkdir", Path::new("logs/a"), "permission denied");
    assert!(matches!(err, LabError::Io(_)));
    assert_eq!(err.info().message, "permission denied");
    assert_eq!(err.info().context["path"], "logs/a");
}

#[test]
fn display_includes_context_and_hint() {
    let err = LabError::Config(
        ErrorInfo::new("config.missing_max", "range is missing `max`")
            .with_context("param", "beta")
            .with_hint("add a `max` key"),
    );
    let rendered = err.to_string();
    assert_eq!(
        rendered,
        "config error: range is missing `max` (code: config.missing_max) | context: [param=beta] | hint: add a `max` key"
    );
}

#[test]
fn provenance_serializes_with_type_key() {
    let yaml = serde_yaml::to_string(&VcsProvenance::git("abc123")).expect("yaml");
    assert_eq!(yaml, "type: git\ncommit: abc123\n");
}
