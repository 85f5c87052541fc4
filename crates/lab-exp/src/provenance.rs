//! Version-control provenance for a sweep.

use std::path::Path;
use std::process::Command;

use lab_core::errors::{ErrorInfo, LabError};
use lab_core::VcsProvenance;
use tracing::debug;

use crate::config::Configuration;

/// Queries a working tree for uncommitted changes and its current commit.
pub trait Vcs {
    /// Summary of uncommitted changes; empty when the tree is clean.
    fn diff_summary(&self, repo: &Path) -> Result<String, LabError>;
    /// Identifier of the checked-out commit.
    fn head_commit(&self, repo: &Path) -> Result<String, LabError>;
}

/// [`Vcs`] backed by the `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    fn git(&self, repo: &Path, args: &[&str]) -> Result<String, LabError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .map_err(|err| {
                LabError::Provenance(
                    ErrorInfo::new("provenance.git_spawn", err.to_string())
                        .with_path(repo)
                        .with_hint("is git installed and on PATH?"),
                )
            })?;
        if !output.status.success() {
            return Err(LabError::Provenance(
                ErrorInfo::new(
                    "provenance.git_failed",
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                )
                .with_path(repo)
                .with_context("command", format!("git {}", args.join(" ")))
                .with_context("status", output.status.to_string()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Vcs for GitCli {
    fn diff_summary(&self, repo: &Path) -> Result<String, LabError> {
        self.git(repo, &["diff", "--stat"])
    }

    fn head_commit(&self, repo: &Path) -> Result<String, LabError> {
        self.git(repo, &["rev-parse", "HEAD"])
    }
}

/// Verifies the configured repository is clean and returns its commit.
///
/// Returns `Ok(None)` when the configuration declares no `vcs` block.
pub fn record(config: &Configuration, vcs: &dyn Vcs) -> Result<Option<VcsProvenance>, LabError> {
    let (Some(spec), Some(repo)) = (&config.vcs, config.repo_dir()?) else {
        return Ok(None);
    };
    let diff = vcs.diff_summary(&repo)?;
    if !diff.trim().is_empty() {
        return Err(LabError::Provenance(
            ErrorInfo::new(
                "provenance.dirty",
                format!("uncommitted changes in git repository: {}", diff.trim()),
            )
            .with_path(&repo)
            .with_hint("commit or stash the changes before starting the sweep"),
        ));
    }
    let commit = vcs.head_commit(&repo)?;
    if commit.is_empty() {
        return Err(LabError::Provenance(
            ErrorInfo::new("provenance.no_commit", "repository reported an empty commit id")
                .with_path(&repo),
        ));
    }
    debug!(repo = %repo.display(), %commit, "recorded provenance");
    Ok(Some(VcsProvenance {
        kind: spec.kind,
        commit,
    }))
}
