//! One file to put into the object store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Canned ACL applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    /// Owner-only access.
    Private,
    /// Anyone may read the object.
    PublicRead,
}

impl ObjectAcl {
    /// Returns the header value of this ACL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
        }
    }
}

impl fmt::Display for ObjectAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    /// File on disk.
    pub local_path: PathBuf,
    /// Destination object key.
    pub remote_key: String,
    /// Canned ACL, bucket default if `None`.
    pub acl: Option<ObjectAcl>,
    /// Cache-control header, none if `None`.
    pub cache_control: Option<String>,
}

impl UploadTask {
    /// Creates a task with no ACL and no cache-control header.
    #[must_use]
    pub fn new(local_path: impl Into<PathBuf>, remote_key: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_key: remote_key.into(),
            acl: None,
            cache_control: None,
        }
    }

    /// Sets the ACL.
    #[must_use]
    pub const fn with_acl(mut self, acl: ObjectAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Sets the cache-control header.
    #[must_use]
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }
}

/// Joins key segments with `/`, dropping empty segments and stray slashes.
#[must_use]
pub fn object_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
