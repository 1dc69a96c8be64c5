//! Local filesystem blob store.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use fbox_types::BlobHash;
use tempfile::NamedTempFile;

use crate::copy::copy_declared;
use crate::error::BlobResult;
use crate::traits::{BlobStore, OpenBlob};

/// Directory (under the root) that uploads are staged in.
const STAGING_DIR: &str = ".staging";

/// Filesystem-backed blob store.
///
/// Stores blobs in a directory structure:
/// ```text
/// {root}/
///   .staging/          # in-flight uploads
///   {hash[0..2]}/      # first 2 chars of the hash for sharding
///     {hash}
/// ```
///
/// Uploads are written to a temporary file under `.staging/` and then renamed
/// into place, so readers only ever see complete blobs.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    staging: PathBuf,
    verify_digest: bool,
}

impl FsBlobStore {
    /// Open (creating if needed) a blob store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        Ok(Self {
            root,
            staging,
            verify_digest: false,
        })
    }

    /// Recompute the SHA-256 of uploaded bytes and reject mismatches.
    pub fn with_digest_verification(mut self, verify: bool) -> Self {
        self.verify_digest = verify;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location of the blob stored under `hash`.
    pub fn blob_path(&self, hash: &BlobHash) -> PathBuf {
        let h = hash.as_str();
        if h.len() >= 2 {
            self.root.join(&h[..2]).join(h)
        } else {
            self.root.join(h)
        }
    }
}

impl BlobStore for FsBlobStore {
    fn has(&self, hash: &BlobHash) -> BlobResult<bool> {
        match fs::metadata(self.blob_path(hash)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, hash: &BlobHash, reader: &mut dyn Read, declared_size: u64) -> BlobResult<()> {
        let path = self.blob_path(hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Dropping the temp file on any error below removes the partial upload.
        let mut staged = NamedTempFile::new_in(&self.staging)?;
        copy_declared(hash, reader, staged.as_file_mut(), declared_size, self.verify_digest)?;
        staged.as_file().sync_all()?;

        // Rename replaces any existing file atomically; under content addressing
        // both copies hold the same bytes.
        staged.persist(&path).map_err(|e| e.error)?;
        tracing::debug!(hash = %hash.short_hex(), size = declared_size, "blob stored");
        Ok(())
    }

    fn open(&self, hash: &BlobHash) -> BlobResult<Option<OpenBlob>> {
        let file = match File::open(self.blob_path(hash)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();
        Ok(Some(OpenBlob {
            reader: Box::new(file),
            size,
        }))
    }
}
