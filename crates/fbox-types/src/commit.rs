use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::BlobHash;
use crate::id::{BoxId, CommitId};

/// Mode recorded for an entry when the client does not send one (`0o644`).
pub const DEFAULT_FILE_MODE: u32 = 0o644;

fn default_mode() -> u32 {
    DEFAULT_FILE_MODE
}

/// One file within a commit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Repository-relative path, unique within its commit.
    pub path: String,
    /// Digest of the file bytes.
    pub sha256: BlobHash,
    /// File size in bytes.
    pub size: u64,
    /// Unix mode bits.
    #[serde(default = "default_mode")]
    pub mode: u32,
}

impl Entry {
    pub fn new(path: impl Into<String>, sha256: BlobHash, size: u64) -> Self {
        Self {
            path: path.into(),
            sha256,
            size,
            mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Check that every entry has a usable path and no path repeats.
pub fn validate_entries(entries: &[Entry]) -> Result<(), TypeError> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.path.is_empty() {
            return Err(TypeError::InvalidPath {
                path: entry.path.clone(),
                reason: "path must not be empty".into(),
            });
        }
        if entry.path.contains('\0') {
            return Err(TypeError::InvalidPath {
                path: entry.path.clone(),
                reason: "path must not contain NUL".into(),
            });
        }
        if !seen.insert(entry.path.as_str()) {
            return Err(TypeError::DuplicatePath(entry.path.clone()));
        }
    }
    Ok(())
}

/// An immutable snapshot of named file entries.
///
/// Once persisted, neither the commit fields nor its entries change. A commit
/// without a parent is a root commit for its branch's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub box_id: BoxId,
    pub branch: String,
    pub parent_id: Option<CommitId>,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Entries in insertion order.
    pub entries: Vec<Entry>,
}

impl Commit {
    /// Find the entry stored at `path`.
    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A commit about to be saved. Identifier and timestamp are assigned on save
/// when absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCommit {
    pub id: Option<CommitId>,
    pub box_id: BoxId,
    pub branch: String,
    pub parent_id: Option<CommitId>,
    pub message: String,
    pub author: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub entries: Vec<Entry>,
}

impl NewCommit {
    pub fn new(box_id: BoxId, branch: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            id: None,
            box_id,
            branch: branch.into(),
            parent_id: None,
            message: String::new(),
            author: String::new(),
            timestamp: None,
            entries,
        }
    }

    pub fn with_parent(mut self, parent: Option<CommitId>) -> Self {
        self.parent_id = parent;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Validate entries and assign any missing identifier or timestamp.
    pub fn into_commit(self, now: DateTime<Utc>) -> Result<Commit, TypeError> {
        validate_entries(&self.entries)?;
        Ok(Commit {
            id: self.id.unwrap_or_else(CommitId::generate),
            box_id: self.box_id,
            branch: self.branch,
            parent_id: self.parent_id,
            message: self.message,
            author: self.author,
            timestamp: self.timestamp.unwrap_or(now),
            entries: self.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, hash: &str) -> Entry {
        Entry::new(path, BlobHash::parse(hash).unwrap(), 3)
    }

    #[test]
    fn entry_mode_defaults_on_the_wire() {
        let e: Entry =
            serde_json::from_str(r#"{"path":"README.md","sha256":"abc123","size":3}"#).unwrap();
        assert_eq!(e.mode, 420);
        assert_eq!(e.size, 3);
    }

    #[test]
    fn entry_rejects_bad_hash_on_the_wire() {
        let res: Result<Entry, _> =
            serde_json::from_str(r#"{"path":"a","sha256":"zz","size":1,"mode":420}"#);
        assert!(res.is_err());
    }

    #[test]
    fn duplicate_paths_rejected() {
        let entries = vec![entry("a.txt", "aa"), entry("a.txt", "bb")];
        assert_eq!(
            validate_entries(&entries),
            Err(TypeError::DuplicatePath("a.txt".into()))
        );
    }

    #[test]
    fn same_hash_different_paths_allowed() {
        let entries = vec![entry("a.txt", "aa"), entry("b.txt", "aa")];
        assert!(validate_entries(&entries).is_ok());
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(
            validate_entries(&[entry("", "aa")]),
            Err(TypeError::InvalidPath { .. })
        ));
    }

    #[test]
    fn into_commit_assigns_id_and_timestamp() {
        let now = Utc::now();
        let c = NewCommit::new(BoxId::from("box"), "main", vec![entry("a", "aa")])
            .with_message("init")
            .into_commit(now)
            .unwrap();
        assert_eq!(c.timestamp, now);
        assert!(c.is_root());
        assert_eq!(c.message, "init");
        assert_eq!(c.entry("a").map(|e| e.size), Some(3));
        assert!(c.entry("missing").is_none());
    }

    #[test]
    fn into_commit_keeps_supplied_fields() {
        let ts = DateTime::parse_from_rfc3339("2025-10-11T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let c = NewCommit {
            id: Some(CommitId::from("01J789")),
            timestamp: Some(ts),
            ..NewCommit::new(BoxId::from("01J123"), "main", vec![])
        }
        .with_parent(Some(CommitId::from("01J000")))
        .with_author("token:abc")
        .into_commit(Utc::now())
        .unwrap();
        assert_eq!(c.id.as_str(), "01J789");
        assert_eq!(c.timestamp, ts);
        assert_eq!(c.parent_id, Some(CommitId::from("01J000")));
        assert_eq!(c.author, "token:abc");
    }
}
