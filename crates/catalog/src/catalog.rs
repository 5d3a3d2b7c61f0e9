//! The catalog view-model: authoritative record list plus CRUD orchestration.

use crate::error::{Error, ErrorKind, Result};
use crate::key;
use crate::record::{FileRecord, META_DISPLAY_NAME, META_SUBJECT};
use crate::subject::Subject;
use satchel_storage::BackendHandle;
use std::collections::HashMap;
use std::path::Path;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Upper bound on entries fetched per sync. Listings past this are ignored
/// rather than paginated; a personal study library doesn't get that big.
const LIST_LIMIT: usize = 1000;

#[derive(Default)]
struct State {
    files: Vec<FileRecord>,
    loading: bool,
    last_error: Option<String>,
}

/// In-memory catalog of stored PDFs, kept in sync with a storage backend.
///
/// The record list is only ever replaced wholesale from a fresh backend
/// listing; mutations (upload, rename, delete) go to the backend first and
/// then resynchronize, so no record exists locally that the backend didn't
/// confirm. Every mutating operation is fail-soft: it reports success or
/// failure as a `bool` and keeps the failure message readable via
/// [`Catalog::last_error`] instead of propagating errors to the caller.
/// The message is replaced by the next failure, never cleared on success.
///
/// Operations may be invoked concurrently; they are not queued or
/// serialized. Overlapping syncs are a known race: whichever listing
/// completes last determines the observed record list. In-flight
/// operations always run to completion, there is no cancellation.
pub struct Catalog {
    backend: BackendHandle,
    state: RwLock<State>,
}

impl Catalog {
    /// Create an empty catalog on top of a storage backend. Call
    /// [`Catalog::sync`] to populate it.
    pub fn new(backend: BackendHandle) -> Self {
        Self {
            backend,
            state: RwLock::new(State::default()),
        }
    }

    /// Snapshot of the current record list, in backend listing order.
    pub async fn files(&self) -> Vec<FileRecord> {
        self.state.read().await.files.clone()
    }

    /// Whether a sync is currently in flight.
    pub async fn loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the most recent failure, if any operation has failed.
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Replace the record list with a fresh backend listing.
    ///
    /// Non-PDF objects are skipped. On failure the previous list stays in
    /// place, so a transient network blip doesn't blank the catalog.
    pub async fn sync(&self) -> bool {
        match self.sync_inner().await {
            Ok(()) => true,
            Err(err) => {
                self.record_error(&err).await;
                false
            },
        }
    }

    async fn sync_inner(&self) -> Result<()> {
        self.state.write().await.loading = true;
        let listed = self.backend.list(None, LIST_LIMIT, 0).await;
        // Re-acquired after the backend call; holding a write lock across
        // an await would serialize every overlapping operation.
        let mut state = self.state.write().await;
        state.loading = false;
        let objects = match listed {
            Ok(objects) => objects,
            Err(err) => return Err(ErrorKind::storage(err)),
        };
        state.files = objects.iter().filter(|meta| key::is_pdf(&meta.key)).map(FileRecord::from_meta).collect();
        Ok(())
    }

    /// Store a new PDF and resynchronize.
    ///
    /// The storage key is generated fresh (timestamp prefix plus slugged
    /// file name) so an upload can never overwrite an existing object.
    /// Requires a display name that is non-empty after trimming and a file
    /// name with a `.pdf` extension; both are rejected before any backend
    /// call. Returns `true` once the object is stored, even if the
    /// follow-up sync fails (the failure still lands in `last_error`).
    pub async fn upload(&self, data: &[u8], file_name: &str, display_name: &str, subject: Subject) -> bool {
        match self.upload_inner(data, file_name, display_name, subject).await {
            Ok(()) => true,
            Err(err) => {
                self.record_error(&err).await;
                false
            },
        }
    }

    async fn upload_inner(&self, data: &[u8], file_name: &str, display_name: &str, subject: Subject) -> Result<()> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            exn::bail!(ErrorKind::EmptyDisplayName);
        }
        if !key::is_pdf(file_name) {
            exn::bail!(ErrorKind::NotPdf(file_name.to_string()));
        }
        let storage_key = key::generate(file_name, OffsetDateTime::now_utc());
        let custom = Self::metadata_map(display_name, subject);
        self.backend.put(Path::new(&storage_key), data, &custom).await.map_err(ErrorKind::storage)?;
        tracing::debug!(key = %storage_key, %subject, "stored new file");
        // The object is stored; a refetch hiccup is not an upload failure.
        self.sync().await;
        Ok(())
    }

    /// Change a record's display name and subject, then resynchronize.
    ///
    /// Metadata-only: the storage key and the object's bytes never change.
    /// An unknown key surfaces as the backend's not-found failure; there is
    /// no client-side existence check.
    pub async fn rename(&self, storage_key: &Path, display_name: &str, subject: Subject) -> bool {
        match self.rename_inner(storage_key, display_name, subject).await {
            Ok(()) => true,
            Err(err) => {
                self.record_error(&err).await;
                false
            },
        }
    }

    async fn rename_inner(&self, storage_key: &Path, display_name: &str, subject: Subject) -> Result<()> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            exn::bail!(ErrorKind::EmptyDisplayName);
        }
        let custom = Self::metadata_map(display_name, subject);
        self.backend.update_metadata(storage_key, &custom).await.map_err(ErrorKind::storage)?;
        self.sync().await;
        Ok(())
    }

    /// Remove a record's object, then resynchronize.
    ///
    /// Deleting a key that is already absent counts as success; backends
    /// treat batch deletes as idempotent.
    pub async fn delete(&self, storage_key: &Path) -> bool {
        match self.delete_inner(storage_key).await {
            Ok(()) => true,
            Err(err) => {
                self.record_error(&err).await;
                false
            },
        }
    }

    async fn delete_inner(&self, storage_key: &Path) -> Result<()> {
        self.backend.remove(&[storage_key.to_path_buf()]).await.map_err(ErrorKind::storage)?;
        self.sync().await;
        Ok(())
    }

    /// Download a record's bytes for the caller to persist.
    ///
    /// No caching; every call hits the backend. `None` means failure, with
    /// the message in `last_error`.
    pub async fn fetch_content(&self, storage_key: &Path) -> Option<Vec<u8>> {
        match self.backend.fetch(storage_key).await {
            Ok(data) => Some(data),
            Err(err) => {
                let err = ErrorKind::storage(err);
                self.record_error(&err).await;
                None
            },
        }
    }

    fn metadata_map(display_name: &str, subject: Subject) -> HashMap<String, String> {
        HashMap::from([
            (META_DISPLAY_NAME.to_string(), display_name.to_string()),
            (META_SUBJECT.to_string(), subject.as_str().to_string()),
        ])
    }

    /// Fail-soft boundary: remember the message, log it, move on.
    async fn record_error(&self, err: &Error) {
        let message = (**err).to_string();
        tracing::warn!(%message, "catalog operation failed");
        self.state.write().await.last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_storage::StorageBackend;
    use satchel_storage::backend::MockBackend;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn make_test_catalog() -> (Catalog, Arc<MockBackend>) {
        let mock = Arc::new(MockBackend::default());
        let catalog = Catalog::new(mock.clone());
        (catalog, mock)
    }

    async fn seed(mock: &MockBackend, storage_key: &str, display_name: &str, subject: &str) {
        let custom = HashMap::from([
            (META_DISPLAY_NAME.to_string(), display_name.to_string()),
            (META_SUBJECT.to_string(), subject.to_string()),
        ]);
        mock.put(Path::new(storage_key), b"%PDF-1.7", &custom).await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_populates_catalog_with_pdfs_only() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-algebra-notes.pdf", "Algebra Notes", "Maths").await;
        seed(&mock, "200-essay.pdf", "Essay", "English").await;
        mock.put(Path::new("readme.txt"), b"not a pdf", &HashMap::new()).await.unwrap();

        assert!(catalog.sync().await);
        let files = catalog.files().await;
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|record| record.storage_key.extension().is_some()));
        assert!(!files.iter().any(|record| record.storage_key == PathBuf::from("readme.txt")));
        assert!(!catalog.loading().await);
        assert_eq!(catalog.last_error().await, None);
    }

    #[tokio::test]
    async fn test_upload_creates_one_new_record() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-existing.pdf", "Existing", "Science").await;
        catalog.sync().await;

        assert!(catalog.upload(b"%PDF-1.7 algebra", "notes.pdf", "Algebra Notes", Subject::Maths).await);

        let files = catalog.files().await;
        assert_eq!(files.len(), 2);
        let uploaded: Vec<_> = files.iter().filter(|record| record.display_name == "Algebra Notes").collect();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].subject, Subject::Maths);
        assert_ne!(uploaded[0].storage_key, PathBuf::from("100-existing.pdf"));
    }

    #[tokio::test]
    async fn test_upload_trims_display_name() {
        let (catalog, _mock) = make_test_catalog();
        assert!(catalog.upload(b"%PDF-1.7", "notes.pdf", "  Algebra Notes  ", Subject::Maths).await);
        let files = catalog.files().await;
        assert_eq!(files[0].display_name, "Algebra Notes");
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_display_name_before_backend_call() {
        let (catalog, mock) = make_test_catalog();
        assert!(!catalog.upload(b"%PDF-1.7", "notes.pdf", "   ", Subject::Maths).await);
        assert!(catalog.files().await.is_empty());
        assert!(catalog.last_error().await.is_some());
        // Nothing reached the backend.
        assert_eq!(mock.list(None, 1000, 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let (catalog, mock) = make_test_catalog();
        assert!(!catalog.upload(b"plain text", "notes.txt", "Notes", Subject::Maths).await);
        assert!(catalog.last_error().await.is_some());
        assert_eq!(mock.list(None, 1000, 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_upload_succeeds_even_when_refetch_fails() {
        let (catalog, mock) = make_test_catalog();
        mock.set_list_failure("listing offline").await;

        assert!(catalog.upload(b"%PDF-1.7", "notes.pdf", "Algebra Notes", Subject::Maths).await);

        // The sync after the upload failed, so the catalog saw nothing...
        assert!(catalog.files().await.is_empty());
        assert_eq!(catalog.last_error().await, Some("backend error: listing offline".to_string()));
        // ...but the object itself made it to storage.
        mock.clear_failure().await;
        assert_eq!(mock.list(None, 1000, 0).await.unwrap().len(), 1);
        assert!(catalog.sync().await);
        assert_eq!(catalog.files().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_updates_metadata_only() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-notes.pdf", "Before", "Maths").await;
        catalog.sync().await;

        assert!(catalog.rename(Path::new("100-notes.pdf"), "After", Subject::Science).await);

        let files = catalog.files().await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].display_name, "After");
        assert_eq!(files[0].subject, Subject::Science);
        assert_eq!(files[0].storage_key, PathBuf::from("100-notes.pdf"));
        // The object's bytes are untouched.
        assert_eq!(mock.fetch(Path::new("100-notes.pdf")).await.unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_rename_rejects_empty_name_before_backend_call() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-notes.pdf", "Before", "Maths").await;
        catalog.sync().await;

        assert!(!catalog.rename(Path::new("100-notes.pdf"), "   ", Subject::Science).await);

        assert_eq!(catalog.files().await[0].display_name, "Before");
        assert!(catalog.last_error().await.is_some());
        // The backend still holds the original metadata.
        let meta = mock.stat(Path::new("100-notes.pdf")).await.unwrap();
        assert_eq!(meta.custom.get(META_DISPLAY_NAME).map(String::as_str), Some("Before"));
    }

    #[tokio::test]
    async fn test_rename_missing_key_reports_backend_error() {
        let (catalog, _mock) = make_test_catalog();
        assert!(!catalog.rename(Path::new("missing.pdf"), "Name", Subject::Maths).await);
        let message = catalog.last_error().await.unwrap();
        assert!(message.contains("not found"), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-notes.pdf", "Notes", "Maths").await;
        seed(&mock, "200-essay.pdf", "Essay", "English").await;
        catalog.sync().await;

        assert!(catalog.delete(Path::new("100-notes.pdf")).await);

        let files = catalog.files().await;
        assert_eq!(files.len(), 1);
        assert!(!files.iter().any(|record| record.storage_key == PathBuf::from("100-notes.pdf")));
    }

    #[tokio::test]
    async fn test_delete_absent_key_counts_as_success() {
        let (catalog, _mock) = make_test_catalog();
        assert!(catalog.delete(Path::new("never-existed.pdf")).await);
        assert_eq!(catalog.last_error().await, None);
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_previous_records() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-a.pdf", "A", "Maths").await;
        seed(&mock, "200-b.pdf", "B", "Science").await;
        seed(&mock, "300-c.pdf", "C", "Hindi").await;
        assert!(catalog.sync().await);
        assert_eq!(catalog.files().await.len(), 3);

        mock.set_failure("storage unavailable").await;
        assert!(!catalog.sync().await);

        assert_eq!(catalog.files().await.len(), 3);
        assert!(catalog.last_error().await.is_some());
        assert!(!catalog.loading().await);
    }

    #[tokio::test]
    async fn test_error_is_not_cleared_by_later_success() {
        let (catalog, mock) = make_test_catalog();
        mock.set_failure("storage unavailable").await;
        assert!(!catalog.sync().await);
        assert!(catalog.last_error().await.is_some());

        mock.clear_failure().await;
        assert!(catalog.sync().await);
        // Still reporting the old failure; only the next failure replaces it.
        assert!(catalog.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_error_is_replaced_by_next_failure() {
        let (catalog, mock) = make_test_catalog();
        mock.set_failure("first failure").await;
        assert!(!catalog.sync().await);
        mock.set_failure("second failure").await;
        assert!(!catalog.sync().await);
        assert_eq!(catalog.last_error().await, Some("backend error: second failure".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_content_returns_bytes() {
        let (catalog, mock) = make_test_catalog();
        seed(&mock, "100-notes.pdf", "Notes", "Maths").await;
        let data = catalog.fetch_content(Path::new("100-notes.pdf")).await;
        assert_eq!(data.as_deref(), Some(b"%PDF-1.7".as_slice()));
    }

    #[tokio::test]
    async fn test_fetch_content_missing_key() {
        let (catalog, _mock) = make_test_catalog();
        assert_eq!(catalog.fetch_content(Path::new("missing.pdf")).await, None);
        assert!(catalog.last_error().await.is_some());
    }
}
