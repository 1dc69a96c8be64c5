use std::collections::HashSet;
use std::sync::Arc;

use fbox_blob::BlobStore;
use fbox_meta::{validate_branch_name, MetaError, MetadataStore};
use fbox_types::{validate_entries, BlobHash, BoxRecord, Commit, CommitId, Entry, NewCommit};
use serde::{Deserialize, Serialize};

use crate::error::{PushError, PushResult};

/// Hashes the client still has to upload before finalizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPlan {
    /// Distinct hashes absent from the blob store, in first-seen order.
    pub missing: Vec<BlobHash>,
    /// Number of entries submitted, duplicates included.
    pub total: usize,
}

/// Request to turn an entry set into a commit on a branch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// Target branch; the box's default branch when absent or empty.
    #[serde(default)]
    pub branch: Option<String>,
    /// Head the client built on. Absent or empty means the branch must not
    /// exist yet.
    #[serde(default)]
    pub parent_commit_id: Option<CommitId>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// Distinct hashes of `entries`, in the order they first appear.
fn distinct_hashes(entries: &[Entry]) -> Vec<BlobHash> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .map(|e| &e.sha256)
        .filter(|h| seen.insert(*h))
        .cloned()
        .collect()
}

/// Runs the two-phase push protocol against shared stores.
///
/// Holds no locks of its own: ref safety comes entirely from
/// [`MetadataStore::move_ref`].
#[derive(Clone)]
pub struct PushCoordinator {
    blobs: Arc<dyn BlobStore>,
    meta: Arc<dyn MetadataStore>,
}

impl PushCoordinator {
    pub fn new(blobs: Arc<dyn BlobStore>, meta: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, meta }
    }

    /// Report which of the entries' blobs the store does not hold yet.
    pub fn plan(&self, target: &BoxRecord, entries: &[Entry]) -> PushResult<PushPlan> {
        let missing = self.blobs.missing(&distinct_hashes(entries))?;
        tracing::debug!(
            box_id = %target.id,
            total = entries.len(),
            missing = missing.len(),
            "push planned"
        );
        Ok(PushPlan {
            missing,
            total: entries.len(),
        })
    }

    /// Create a commit from `req` and advance its branch from the stated
    /// parent.
    ///
    /// Every blob is checked again here, since plan results can be stale. On
    /// [`PushError::Conflict`] the commit has been saved but no ref points at
    /// it; the client should re-read the branch head and retry with it as the
    /// parent.
    pub fn finalize(&self, target: &BoxRecord, req: FinalizeRequest) -> PushResult<Commit> {
        let branch = match req.branch {
            Some(b) if !b.is_empty() => b,
            _ => target.default_branch.clone(),
        };
        let parent = req.parent_commit_id.filter(|p| !p.as_str().is_empty());

        validate_branch_name(&branch).map_err(|e| PushError::BadRequest(e.to_string()))?;
        validate_entries(&req.entries)?;

        let missing = self.blobs.missing(&distinct_hashes(&req.entries))?;
        if !missing.is_empty() {
            tracing::warn!(
                box_id = %target.id,
                branch = %branch,
                missing = missing.len(),
                "finalize rejected: blobs missing"
            );
            return Err(PushError::MissingBlobs(missing));
        }

        let commit = self.meta.save_commit(
            NewCommit::new(target.id.clone(), branch.clone(), req.entries)
                .with_parent(parent.clone())
                .with_message(req.message)
                .with_author(req.author),
        )?;

        match self
            .meta
            .move_ref(&target.id, &branch, parent.as_ref(), &commit.id)
        {
            Ok(()) => {
                tracing::info!(
                    box_id = %target.id,
                    branch = %branch,
                    commit = %commit.id,
                    entries = commit.entries.len(),
                    "commit finalized"
                );
                Ok(commit)
            }
            Err(MetaError::Conflict { current, .. }) => {
                tracing::warn!(
                    box_id = %target.id,
                    branch = %branch,
                    orphan = %commit.id,
                    "finalize lost ref race"
                );
                Err(PushError::Conflict {
                    branch,
                    commit_id: commit.id,
                    current,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
