use thiserror::Error;

/// Errors produced by type parsing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid blob hash {value:?}: {reason}")]
    InvalidHash { value: String, reason: String },

    #[error("invalid visibility: {0:?} (expected public, unlisted or private)")]
    InvalidVisibility(String),

    #[error("invalid box name {name:?}: {reason}")]
    InvalidBoxName { name: String, reason: String },

    #[error("invalid entry path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("duplicate entry path in commit: {0}")]
    DuplicatePath(String),
}
