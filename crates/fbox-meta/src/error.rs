//! Error types for metadata operations.

use fbox_types::{BoxId, CommitId, TypeError};
use thiserror::Error;

/// Errors that can occur during metadata operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A box with this (namespace, name) already exists.
    #[error("box already exists: {namespace}/{name}")]
    BoxExists { namespace: String, name: String },

    /// The box referenced by a commit or ref does not exist.
    #[error("box not found: {0}")]
    BoxNotFound(BoxId),

    /// A commit with this identifier was already saved.
    #[error("commit already exists: {0}")]
    CommitExists(CommitId),

    /// The commit a ref should point at was never saved.
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// A record failed validation before it was written.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] TypeError),

    /// The ref's current value did not match the expected parent.
    #[error(
        "ref conflict on {box_id}/{branch}: expected {}, found {}",
        display_opt(.expected),
        display_opt(.current)
    )]
    Conflict {
        box_id: BoxId,
        branch: String,
        expected: Option<CommitId>,
        current: Option<CommitId>,
    },

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Error from the SQLite engine.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl MetaError {
    /// Whether this is a ref compare-and-swap mismatch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

fn display_opt(id: &Option<CommitId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "<none>".to_string(),
    }
}

/// Convenience type alias for metadata operations.
pub type MetaResult<T> = std::result::Result<T, MetaError>;
