//! Provenance descriptors recorded alongside sweep artefacts.

use serde::{Deserialize, Serialize};

/// Version-control systems the recorder knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    /// A git working tree.
    #[default]
    Git,
}

/// Source-control state proving which code produced a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsProvenance {
    /// Repository flavour the commit belongs to.
    #[serde(rename = "type")]
    pub kind: VcsKind,
    /// Commit identifier checked out when the sweep started.
    pub commit: String,
}

impl VcsProvenance {
    /// Creates a git provenance record for the given commit.
    pub fn git(commit: impl Into<String>) -> Self {
        Self {
            kind: VcsKind::Git,
            commit: commit.into(),
        }
    }
}
