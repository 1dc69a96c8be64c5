use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

use fbox_types::BlobHash;

use crate::error::{BlobError, BlobResult};

/// A readable, seekable blob stream.
pub trait BlobRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> BlobRead for T {}

/// An opened blob: a stream positioned at offset 0 plus the stored size.
pub struct OpenBlob {
    pub reader: Box<dyn BlobRead>,
    pub size: u64,
}

impl std::fmt::Debug for OpenBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenBlob").field("size", &self.size).finish()
    }
}

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - Blobs are immutable once written. Writing the same hash again is
///   idempotent and never exposes a partially written blob to a concurrent
///   `open` of that hash.
/// - `put` persists exactly `declared_size` bytes. A stream that ends early
///   is an error and nothing becomes visible.
/// - The store trusts the caller-supplied hash unless a backend was built to
///   verify digests.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlobStore: Send + Sync {
    /// Check whether content for `hash` is stored.
    fn has(&self, hash: &BlobHash) -> BlobResult<bool>;

    /// Store exactly `declared_size` bytes read from `reader` under `hash`.
    fn put(&self, hash: &BlobHash, reader: &mut dyn Read, declared_size: u64) -> BlobResult<()>;

    /// Open the blob stored under `hash`.
    ///
    /// Returns `Ok(None)` if no blob exists for that hash.
    fn open(&self, hash: &BlobHash) -> BlobResult<Option<OpenBlob>>;

    /// Return the hashes in `hashes` that are not stored, preserving order.
    ///
    /// Default implementation calls `has()` for each hash. Backends may
    /// override for better performance.
    fn missing(&self, hashes: &[BlobHash]) -> BlobResult<Vec<BlobHash>> {
        let mut out = Vec::new();
        for hash in hashes {
            if !self.has(hash)? {
                out.push(hash.clone());
            }
        }
        Ok(out)
    }

    /// Read the half-open byte range `range` of a blob.
    ///
    /// Returns `Ok(None)` if the blob does not exist. The range must lie
    /// within the blob; an out-of-bounds range surfaces as an I/O error.
    fn read_range(&self, hash: &BlobHash, range: Range<u64>) -> BlobResult<Option<Vec<u8>>> {
        let Some(mut blob) = self.open(hash)? else {
            return Ok(None);
        };
        if range.start > range.end || range.end > blob.size {
            return Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "range {}..{} outside blob of size {}",
                    range.start, range.end, blob.size
                ),
            )));
        }
        blob.reader.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        blob.reader.read_exact(&mut buf)?;
        Ok(Some(buf))
    }
}
