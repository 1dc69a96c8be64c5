//! Content-addressed blob storage for fbox.
//!
//! Raw file content is stored once per distinct hash, so every entry with the
//! same hash, in any commit of any box, shares one stored copy. The store
//! never interprets content and, by default, trusts the caller-supplied hash.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- sharded directory tree with staged, atomically
//!   renamed uploads
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written.
//! 2. Stage-then-publish: a blob becomes visible only when complete.
//! 3. Concurrent writes of the same hash are safe without external locking.
//! 4. A short upload is an error, never a truncated blob.
//! 5. All I/O errors are propagated, never silently ignored.

mod copy;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use copy::sha256_hex;
pub use error::{BlobError, BlobResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::{BlobRead, BlobStore, OpenBlob};
