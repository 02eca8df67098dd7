//! Error kinds surfaced by the linking engine.
//!
//! These travel inside `anyhow::Error`; callers that need to branch on the
//! kind use `err.downcast_ref::<LinkError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// The destination exists and resolves somewhere other than the planned source.
    #[error("Link conflict at {dest:?}: expected it to point to {expected:?}, but it points to {actual:?}")]
    LinkConflict {
        dest: PathBuf,
        expected: PathBuf,
        actual: PathBuf,
    },

    /// Workspace-local dependencies form a cycle; the members are the projects
    /// that could not be ordered.
    #[error("Cyclic dependency between workspace packages: {}", format_members(.members))]
    CyclicDependency { members: Vec<PathBuf> },

    /// File links were requested for a component that has no directory on disk.
    #[error("Component {component} has no root directory to link from")]
    MissingComponentRoot { component: String },

    /// The package resolver could not resolve a requested reference.
    #[error("Could not resolve {reference}: {reason}")]
    UnresolvedReference { reference: String, reason: String },
}

fn format_members(members: &[PathBuf]) -> String {
    members
        .iter()
        .map(|m| m.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl LinkError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LinkError::LinkConflict { .. })
    }
}
