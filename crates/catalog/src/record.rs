//! Catalog record model, derived from raw storage object metadata.

use crate::subject::Subject;
use satchel_storage::ObjectMeta;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Custom metadata field carrying the user-facing name.
pub(crate) const META_DISPLAY_NAME: &str = "display_name";
/// Custom metadata field carrying the subject tag.
pub(crate) const META_SUBJECT: &str = "subject";

/// One stored PDF as known to the catalog.
///
/// Records are built only from backend listings ([`FileRecord::from_meta`]);
/// the catalog never fabricates one locally. The `storage_key` is the
/// immutable address of the object; a rename changes `display_name` and
/// `subject` but never the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Stable identifier, derived from the storage key.
    pub id: String,
    /// User-facing name. Falls back to the key's file stem when the
    /// object carries no name metadata.
    pub display_name: String,
    /// The opaque key used for all storage-backend calls.
    pub storage_key: PathBuf,
    /// Subject tag, [`Subject::Unsorted`] when absent or unrecognized.
    pub subject: Subject,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// When the object was stored. Immutable after creation.
    pub created_at: OffsetDateTime,
    /// When the object or its metadata last changed.
    pub updated_at: OffsetDateTime,
}

impl FileRecord {
    /// Build a record from a raw storage listing entry.
    ///
    /// Backends don't all report both timestamps (S3 only has
    /// last-modified), so each one falls back to the other, and both fall
    /// back to the current time rather than inventing an epoch date.
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        let display_name = meta
            .custom
            .get(META_DISPLAY_NAME)
            .map(|name| name.to_string())
            .unwrap_or_else(|| stem_of(&meta.key));
        let subject = Subject::from_metadata(meta.custom.get(META_SUBJECT).map(String::as_str));
        let now = OffsetDateTime::now_utc();
        let created_at = meta.created.or(meta.modified).unwrap_or(now);
        let updated_at = meta.modified.or(meta.created).unwrap_or(now);
        Self {
            id: meta.key.display().to_string(),
            display_name,
            storage_key: meta.key.clone(),
            subject,
            size_bytes: meta.size,
            created_at,
            updated_at,
        }
    }
}

/// Key with directories and extension stripped, for display fallback.
fn stem_of(key: &Path) -> String {
    key.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| key.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_test_meta(key: &str, custom: &[(&str, &str)]) -> ObjectMeta {
        let custom: HashMap<String, String> =
            custom.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ObjectMeta::new(key, 2048).with_custom(custom)
    }

    #[test]
    fn test_from_meta_with_full_metadata() {
        let meta = make_test_meta(
            "1756239000123-algebra-notes.pdf",
            &[("display_name", "Algebra Notes"), ("subject", "Maths")],
        );
        let record = FileRecord::from_meta(&meta);
        assert_eq!(record.id, "1756239000123-algebra-notes.pdf");
        assert_eq!(record.display_name, "Algebra Notes");
        assert_eq!(record.storage_key, PathBuf::from("1756239000123-algebra-notes.pdf"));
        assert_eq!(record.subject, Subject::Maths);
        assert_eq!(record.size_bytes, 2048);
    }

    #[test]
    fn test_display_name_falls_back_to_stem() {
        let meta = make_test_meta("1756239000123-algebra-notes.pdf", &[]);
        let record = FileRecord::from_meta(&meta);
        assert_eq!(record.display_name, "1756239000123-algebra-notes");
    }

    #[test]
    fn test_unknown_subject_coerced_to_unsorted() {
        let meta = make_test_meta("notes.pdf", &[("subject", "Astrology")]);
        let record = FileRecord::from_meta(&meta);
        assert_eq!(record.subject, Subject::Unsorted);
    }

    #[test]
    fn test_timestamps_fall_back_to_each_other() {
        let modified = OffsetDateTime::from_unix_timestamp(1_756_239_000).unwrap();
        let meta = make_test_meta("notes.pdf", &[]).with_modified(modified);
        let record = FileRecord::from_meta(&meta);
        // A backend that only reports last-modified still yields a created_at.
        assert_eq!(record.created_at, modified);
        assert_eq!(record.updated_at, modified);
    }

    #[test]
    fn test_timestamps_default_to_now_together() {
        let meta = make_test_meta("notes.pdf", &[]);
        let record = FileRecord::from_meta(&meta);
        assert_eq!(record.created_at, record.updated_at);
    }
}
