use fbox_blob::BlobError;
use fbox_meta::MetaError;
use fbox_types::{BlobHash, CommitId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{} blob(s) missing, upload them before finalizing", .0.len())]
    MissingBlobs(Vec<BlobHash>),

    /// Another push advanced the branch first. The new commit stays stored
    /// but unreferenced.
    #[error("branch {branch} has moved; fetch the latest commit and retry")]
    Conflict {
        branch: String,
        commit_id: CommitId,
        current: Option<CommitId>,
    },

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("metadata store error: {0}")]
    Meta(#[from] MetaError),
}

impl From<TypeError> for PushError {
    fn from(e: TypeError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

pub type PushResult<T> = Result<T, PushError>;
