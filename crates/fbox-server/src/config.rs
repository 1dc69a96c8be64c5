use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server settings, read from TOML. Keys missing from the file keep their
/// defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding the content-addressed blob tree.
    pub blob_root: PathBuf,
    /// SQLite database file for boxes, commits and refs.
    pub meta_path: PathBuf,
    /// Namespace that boxes created over HTTP belong to.
    pub namespace: String,
    /// Largest accepted blob upload, in bytes.
    pub max_blob_size: u64,
    /// Recompute SHA-256 on upload and reject bytes that do not match.
    pub verify_digests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            blob_root: PathBuf::from("./data/blobs"),
            meta_path: PathBuf::from("./data/meta.db"),
            namespace: fbox_types::DEFAULT_NAMESPACE.to_string(),
            max_blob_size: 1024 * 1024 * 1024,
            verify_digests: false,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse the TOML file at `path`.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}
