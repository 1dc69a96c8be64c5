//! Metadata storage for fbox.
//!
//! This crate records boxes (repositories), immutable commits with their file
//! entries, and the branch refs that name each branch's current head. Refs
//! are the only mutable records, and they move only through an atomic
//! compare-and-swap, so a push racing another push either advances the branch
//! or fails with a conflict. A lost update is impossible.
//!
//! # Modules
//!
//! - [`error`] -- Error types for metadata operations
//! - [`traits`] -- The [`MetadataStore`] trait defining the storage interface
//! - [`names`] -- Branch name validation
//! - [`memory`] -- In-memory [`InMemoryMetaStore`] for tests
//! - [`sqlite`] -- Persistent [`SqliteMetaStore`]

pub mod error;
pub mod memory;
pub mod names;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod conformance;

pub use error::{MetaError, MetaResult};
pub use memory::InMemoryMetaStore;
pub use names::validate_branch_name;
pub use sqlite::SqliteMetaStore;
pub use traits::MetadataStore;
