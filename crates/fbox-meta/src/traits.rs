//! The [`MetadataStore`] trait defining the metadata storage interface.
//!
//! Any backend (in-memory, SQLite, another database) implements this trait to
//! hold boxes, commits and branch refs for the push coordinator and the read
//! paths.

use fbox_types::{BoxId, BoxRecord, Commit, CommitId, NewBox, NewCommit};

use crate::error::MetaResult;

/// Durable, transactional storage for boxes, commits and refs.
///
/// Implementations must be thread-safe (`Send + Sync`). Boxes and commits are
/// immutable once written; refs are the only mutable records and change only
/// through [`move_ref`](MetadataStore::move_ref).
pub trait MetadataStore: Send + Sync {
    /// Insert a new box, assigning an identifier and defaults where unset.
    ///
    /// Fails with `BoxExists` if `(namespace, name)` is taken.
    fn create_box(&self, new_box: NewBox) -> MetaResult<BoxRecord>;

    /// Look up a box by namespace and name.
    ///
    /// Returns `Ok(None)` if no such box exists.
    fn get_box(&self, namespace: &str, name: &str) -> MetaResult<Option<BoxRecord>>;

    /// All boxes with `public` visibility, oldest first.
    fn list_public_boxes(&self) -> MetaResult<Vec<BoxRecord>>;

    /// Persist a commit and its entries as one unit, assigning an identifier
    /// and timestamp where unset.
    ///
    /// Does not check blob existence and never touches refs.
    fn save_commit(&self, commit: NewCommit) -> MetaResult<Commit>;

    /// Load a commit with its full entry set.
    ///
    /// Returns `Ok(None)` if the commit does not exist.
    fn get_commit(&self, id: &CommitId) -> MetaResult<Option<Commit>>;

    /// Current head of `branch`, or `Ok(None)` if the branch has no ref yet.
    fn read_ref(&self, box_id: &BoxId, branch: &str) -> MetaResult<Option<CommitId>>;

    /// Atomically advance `branch` from `expected_parent` to `new_commit`.
    ///
    /// - No ref yet: succeeds (creating the ref) only if `expected_parent` is
    ///   `None`.
    /// - Ref at `cur`: succeeds only if `expected_parent == Some(cur)`.
    ///
    /// `new_commit` must be a commit of `box_id`; otherwise the call fails
    /// with `CommitNotFound`. Any mismatch fails with `Conflict` and leaves
    /// the ref unchanged. The
    /// check and the write happen as one atomic step, so of two racing calls
    /// with the same expectation at most one succeeds.
    fn move_ref(
        &self,
        box_id: &BoxId,
        branch: &str,
        expected_parent: Option<&CommitId>,
        new_commit: &CommitId,
    ) -> MetaResult<()>;

    /// Commit the branch ref currently points at.
    ///
    /// Returns `Ok(None)` if the branch has no ref yet.
    fn latest_commit(&self, box_id: &BoxId, branch: &str) -> MetaResult<Option<Commit>> {
        match self.read_ref(box_id, branch)? {
            Some(head) => self.get_commit(&head),
            None => Ok(None),
        }
    }

    /// Up to `limit` commits reachable from the branch head, newest first.
    ///
    /// Follows parent links from the ref, so commits rejected by a failed
    /// `move_ref` never appear.
    fn list_commits(&self, box_id: &BoxId, branch: &str, limit: usize) -> MetaResult<Vec<Commit>> {
        let mut out = Vec::new();
        let mut next = self.read_ref(box_id, branch)?;
        while let Some(id) = next {
            if out.len() >= limit {
                break;
            }
            let Some(commit) = self.get_commit(&id)? else {
                tracing::warn!(commit = %id, branch, "history references a missing commit");
                break;
            };
            next = commit.parent_id.clone();
            out.push(commit);
        }
        Ok(out)
    }
}
