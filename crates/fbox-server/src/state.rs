use std::fs;
use std::sync::Arc;

use fbox_blob::{BlobStore, FsBlobStore};
use fbox_meta::{MetadataStore, SqliteMetaStore};
use fbox_push::PushCoordinator;
use fbox_types::DEFAULT_NAMESPACE;

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Shared handles every request handler works against.
#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub meta: Arc<dyn MetadataStore>,
    pub push: PushCoordinator,
    /// Namespace boxes are created in and looked up from.
    pub namespace: String,
    pub max_blob_size: u64,
}

impl AppState {
    pub fn new(blobs: Arc<dyn BlobStore>, meta: Arc<dyn MetadataStore>) -> Self {
        let push = PushCoordinator::new(Arc::clone(&blobs), Arc::clone(&meta));
        Self {
            blobs,
            meta,
            push,
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_blob_size: ServerConfig::default().max_blob_size,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_blob_size(mut self, limit: u64) -> Self {
        self.max_blob_size = limit;
        self
    }

    /// Open the filesystem blob store and SQLite metadata store named by
    /// `config`, creating directories as needed.
    pub fn open(config: &ServerConfig) -> ServerResult<Self> {
        let blobs = FsBlobStore::open(&config.blob_root)?
            .with_digest_verification(config.verify_digests);
        if let Some(parent) = config.meta_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let meta = SqliteMetaStore::open(&config.meta_path)?;
        tracing::info!(
            blob_root = %config.blob_root.display(),
            meta_path = %config.meta_path.display(),
            "stores opened"
        );

        Ok(Self::new(Arc::new(blobs), Arc::new(meta))
            .with_namespace(config.namespace.clone())
            .with_max_blob_size(config.max_blob_size))
    }
}
