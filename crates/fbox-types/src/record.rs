use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::BoxId;

/// Branch used when a box is created without one.
pub const DEFAULT_BRANCH: &str = "main";

/// Namespace that boxes created over HTTP live in.
pub const DEFAULT_NAMESPACE: &str = "global";

/// Longest accepted box name.
pub const MAX_BOX_NAME_LEN: usize = 100;

/// Listing policy for a box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed by `list_public_boxes`.
    #[default]
    Public,
    /// Reachable by name, never listed.
    Unlisted,
    /// Reachable by name, never listed.
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "unlisted" => Ok(Self::Unlisted),
            "private" => Ok(Self::Private),
            other => Err(TypeError::InvalidVisibility(other.to_string())),
        }
    }
}

/// A box (repository) as persisted by the metadata store.
///
/// `(namespace_id, name)` is unique. Boxes are never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub id: BoxId,
    pub namespace_id: String,
    pub name: String,
    pub visibility: Visibility,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a box. Unset fields take their defaults on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewBox {
    pub id: Option<BoxId>,
    pub namespace_id: String,
    pub name: String,
    pub visibility: Option<Visibility>,
    pub default_branch: Option<String>,
}

impl NewBox {
    /// A creation request in the default namespace with all defaults.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            namespace_id: DEFAULT_NAMESPACE.to_string(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    /// Fill in the identifier, visibility and branch defaults and validate the
    /// name, producing the record to insert.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<BoxRecord, TypeError> {
        validate_box_name(&self.name)?;
        let default_branch = match self.default_branch {
            Some(b) if !b.is_empty() => b,
            _ => DEFAULT_BRANCH.to_string(),
        };
        Ok(BoxRecord {
            id: self.id.unwrap_or_else(BoxId::generate),
            namespace_id: self.namespace_id,
            name: self.name,
            visibility: self.visibility.unwrap_or_default(),
            default_branch,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Box names appear as a single URL path segment.
pub fn validate_box_name(name: &str) -> Result<(), TypeError> {
    let reason = if name.is_empty() {
        Some("name must not be empty".to_string())
    } else if name.chars().count() > MAX_BOX_NAME_LEN {
        Some(format!("name longer than {MAX_BOX_NAME_LEN} characters"))
    } else if name.contains('/') {
        Some("name must not contain '/'".to_string())
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("name must not contain whitespace or control characters".to_string())
    } else if name == "." || name == ".." {
        Some("name must not be a dot segment".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(TypeError::InvalidBoxName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
