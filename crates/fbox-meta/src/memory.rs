//! In-memory metadata store for testing and ephemeral use.
//!
//! [`InMemoryMetaStore`] keeps every record in maps behind a single
//! `RwLock`, so a ref compare-and-swap runs entirely under one write guard.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use fbox_types::{BoxId, BoxRecord, Commit, CommitId, NewBox, NewCommit, Visibility};

use crate::error::{MetaError, MetaResult};
use crate::names::validate_branch_name;
use crate::traits::MetadataStore;

#[derive(Debug, Default)]
struct State {
    boxes: HashMap<BoxId, BoxRecord>,
    /// `(namespace, name)` to box id.
    names: HashMap<(String, String), BoxId>,
    commits: HashMap<CommitId, Commit>,
    /// `(box id, branch)` to head commit.
    refs: HashMap<(BoxId, String), CommitId>,
}

/// An in-memory implementation of [`MetadataStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    state: RwLock<State>,
}

impl InMemoryMetaStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> MetaResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| MetaError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> MetaResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| MetaError::LockPoisoned(e.to_string()))
    }
}

impl MetadataStore for InMemoryMetaStore {
    fn create_box(&self, new_box: NewBox) -> MetaResult<BoxRecord> {
        let record = new_box.into_record(Utc::now())?;
        validate_branch_name(&record.default_branch)?;

        let mut state = self.write()?;
        let key = (record.namespace_id.clone(), record.name.clone());
        if state.names.contains_key(&key) || state.boxes.contains_key(&record.id) {
            return Err(MetaError::BoxExists {
                namespace: record.namespace_id,
                name: record.name,
            });
        }
        state.names.insert(key, record.id.clone());
        state.boxes.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn get_box(&self, namespace: &str, name: &str) -> MetaResult<Option<BoxRecord>> {
        let state = self.read()?;
        let key = (namespace.to_string(), name.to_string());
        Ok(state
            .names
            .get(&key)
            .and_then(|id| state.boxes.get(id))
            .cloned())
    }

    fn list_public_boxes(&self) -> MetaResult<Vec<BoxRecord>> {
        let state = self.read()?;
        let mut out: Vec<BoxRecord> = state
            .boxes
            .values()
            .filter(|b| b.visibility == Visibility::Public)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(out)
    }

    fn save_commit(&self, commit: NewCommit) -> MetaResult<Commit> {
        validate_branch_name(&commit.branch)?;
        let commit = commit.into_commit(Utc::now())?;

        let mut state = self.write()?;
        if !state.boxes.contains_key(&commit.box_id) {
            return Err(MetaError::BoxNotFound(commit.box_id));
        }
        if state.commits.contains_key(&commit.id) {
            return Err(MetaError::CommitExists(commit.id));
        }
        state.commits.insert(commit.id.clone(), commit.clone());
        Ok(commit)
    }

    fn get_commit(&self, id: &CommitId) -> MetaResult<Option<Commit>> {
        Ok(self.read()?.commits.get(id).cloned())
    }

    fn read_ref(&self, box_id: &BoxId, branch: &str) -> MetaResult<Option<CommitId>> {
        let state = self.read()?;
        Ok(state.refs.get(&(box_id.clone(), branch.to_string())).cloned())
    }

    fn move_ref(
        &self,
        box_id: &BoxId,
        branch: &str,
        expected_parent: Option<&CommitId>,
        new_commit: &CommitId,
    ) -> MetaResult<()> {
        validate_branch_name(branch)?;

        let mut state = self.write()?;
        if !state.boxes.contains_key(box_id) {
            return Err(MetaError::BoxNotFound(box_id.clone()));
        }
        if !state
            .commits
            .get(new_commit)
            .is_some_and(|c| &c.box_id == box_id)
        {
            return Err(MetaError::CommitNotFound(new_commit.clone()));
        }

        let key = (box_id.clone(), branch.to_string());
        let current = state.refs.get(&key);
        if current != expected_parent {
            return Err(MetaError::Conflict {
                box_id: box_id.clone(),
                branch: branch.to_string(),
                expected: expected_parent.cloned(),
                current: current.cloned(),
            });
        }
        state.refs.insert(key, new_commit.clone());
        Ok(())
    }
}
