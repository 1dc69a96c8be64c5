use fbox_types::BlobHash;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The stream ended before the declared size was reached.
    #[error("truncated upload for {hash}: expected {expected} bytes, got {actual}")]
    Truncated {
        hash: BlobHash,
        expected: u64,
        actual: u64,
    },

    /// The received bytes do not hash to the key they were stored under.
    #[error("digest mismatch for {hash}: computed {computed}")]
    DigestMismatch { hash: BlobHash, computed: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;
