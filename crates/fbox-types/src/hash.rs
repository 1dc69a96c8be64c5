use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Longest accepted digest, in hex characters (a 512-bit hash).
pub const MAX_HASH_LEN: usize = 128;

/// Hex-encoded content digest used to key a blob.
///
/// Clients compute the digest (currently SHA-256) and the server treats it as
/// an opaque key. Only ASCII hex digits are accepted, which also keeps a hash
/// safe to use as a file name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobHash(String);

impl BlobHash {
    /// Parse and validate a hex digest.
    pub fn parse(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TypeError::InvalidHash {
                value: s,
                reason: "hash must not be empty".into(),
            });
        }
        if s.len() > MAX_HASH_LEN {
            return Err(TypeError::InvalidHash {
                reason: format!("hash longer than {MAX_HASH_LEN} characters"),
                value: s,
            });
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHash {
                reason: format!("contains non-hex character {bad:?}"),
                value: s,
            });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Weak HTTP entity tag derived from this hash: `W/"sha256:{hash}"`.
    pub fn weak_etag(&self) -> String {
        format!("W/\"sha256:{}\"", self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Debug for BlobHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobHash({})", self.short_hex())
    }
}

impl fmt::Display for BlobHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobHash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<BlobHash> for String {
    fn from(h: BlobHash) -> Self {
        h.0
    }
}

impl std::str::FromStr for BlobHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
