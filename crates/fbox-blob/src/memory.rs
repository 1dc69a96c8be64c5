use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::RwLock;

use bytes::Bytes;
use fbox_types::BlobHash;

use crate::copy::copy_declared;
use crate::error::{BlobError, BlobResult};
use crate::traits::{BlobStore, OpenBlob};

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Content is buffered fully before it is
/// inserted, so a blob becomes visible only once complete.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<BlobHash, Bytes>>,
    verify_digest: bool,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            verify_digest: false,
        }
    }

    /// Recompute the SHA-256 of uploaded bytes and reject mismatches.
    pub fn with_digest_verification(mut self, verify: bool) -> Self {
        self.verify_digest = verify;
        self
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> BlobError {
        BlobError::LockPoisoned(e.to_string())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn has(&self, hash: &BlobHash) -> BlobResult<bool> {
        let map = self.blobs.read().map_err(Self::poisoned)?;
        Ok(map.contains_key(hash))
    }

    fn put(&self, hash: &BlobHash, reader: &mut dyn Read, declared_size: u64) -> BlobResult<()> {
        let mut buf = Vec::with_capacity(declared_size.min(1 << 20) as usize);
        copy_declared(hash, reader, &mut buf, declared_size, self.verify_digest)?;
        let mut map = self.blobs.write().map_err(Self::poisoned)?;
        map.insert(hash.clone(), Bytes::from(buf));
        Ok(())
    }

    fn open(&self, hash: &BlobHash) -> BlobResult<Option<OpenBlob>> {
        let map = self.blobs.read().map_err(Self::poisoned)?;
        Ok(map.get(hash).map(|data| OpenBlob {
            size: data.len() as u64,
            reader: Box::new(Cursor::new(data.clone())),
        }))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .field("verify_digest", &self.verify_digest)
            .finish()
    }
}
