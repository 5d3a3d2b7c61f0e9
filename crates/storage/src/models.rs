//! Storage models.

use std::collections::HashMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Object metadata returned by storage backends.
///
/// This represents one stored object as reported by listing and stat
/// operations: its key, size, whatever timestamps the backend tracks, and
/// the custom key/value metadata attached to it. Content is never included;
/// use [`fetch`](crate::StorageBackend::fetch) for that.
///
/// Timestamps are optional because backends differ: S3-compatible services
/// report only a last-modified time, and not every filesystem exposes a
/// creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Relative key from the storage root
    pub key: PathBuf,
    /// Object size in bytes
    pub size: u64,
    /// Creation timestamp, where the backend tracks one
    pub created: Option<OffsetDateTime>,
    /// Last modified timestamp, where the backend tracks one
    pub modified: Option<OffsetDateTime>,
    /// Custom key/value metadata stored alongside the object
    pub custom: HashMap<String, String>,
}
impl ObjectMeta {
    /// Create a new ObjectMeta with no timestamps and empty custom metadata.
    pub fn new(key: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            created: None,
            modified: None,
            custom: HashMap::new(),
        }
    }

    pub fn with_created(mut self, created: OffsetDateTime) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_modified(mut self, modified: OffsetDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_custom(mut self, custom: HashMap<String, String>) -> Self {
        self.custom = custom;
        self
    }
}
