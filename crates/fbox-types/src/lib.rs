//! Foundation types for fbox.
//!
//! This crate provides the records shared by every other fbox crate: boxes
//! (repositories), immutable commits and their file entries, validated content
//! hashes, and time-ordered identifiers.
//!
//! # Key Types
//!
//! - [`BoxId`] / [`CommitId`]: UUID v7 identifiers that sort by creation time
//! - [`BlobHash`]: Hex-encoded content digest used as a blob key
//! - [`BoxRecord`] / [`NewBox`]: A repository and its creation request
//! - [`Commit`] / [`NewCommit`] / [`Entry`]: Immutable snapshots of named files
//! - [`Visibility`]: Listing policy for a box

pub mod commit;
pub mod error;
pub mod hash;
pub mod id;
pub mod record;

pub use commit::{validate_entries, Commit, Entry, NewCommit, DEFAULT_FILE_MODE};
pub use error::TypeError;
pub use hash::BlobHash;
pub use id::{BoxId, CommitId};
pub use record::{
    validate_box_name, BoxRecord, NewBox, Visibility, DEFAULT_BRANCH, DEFAULT_NAMESPACE,
};
