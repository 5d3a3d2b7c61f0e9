//! In-memory storage backend for testing.

use super::ObjectMetaStream;
use crate::error::{ErrorKind, Result};
use crate::models::ObjectMeta;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    custom: HashMap<String, String>,
    created: OffsetDateTime,
    modified: OffsetDateTime,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Ideal
/// for unit tests that need a [`StorageBackend`] without filesystem or
/// network dependencies.
///
/// A test can also inject a failure message with [`MockBackend::set_failure`]
/// to make every subsequent operation fail, which is how "the backend is
/// down" scenarios get exercised.
///
/// # Examples
///
/// ```
/// use satchel_storage::backend::{MockBackend, StorageBackend};
/// use std::collections::HashMap;
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("1756239000123-algebra-notes.pdf", b"%PDF-1.7"),
/// ]);
/// assert!(backend.exists(Path::new("1756239000123-algebra-notes.pdf")).await?);
///
/// backend.put(Path::new("1756239111456-essay.pdf"), b"%PDF-1.7", &HashMap::new()).await?;
/// assert!(backend.exists(Path::new("1756239111456-essay.pdf")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, StoredObject>>,
    failure: RwLock<Option<String>>,
    list_failure: RwLock<Option<String>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects (no custom metadata).
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    ///
    /// # Example
    ///
    /// ```
    /// use satchel_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::with_objects([
    ///     ("one.pdf", b"data file 1"),
    ///     ("dir/two.pdf", b"data file 2"),
    /// ]);
    /// ```
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_path(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid key {}", key.display());
            };
            map.insert(
                validated,
                StoredObject { data: data.into(), custom: HashMap::new(), created: now, modified: now },
            );
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failure: RwLock::new(None),
            list_failure: RwLock::new(None),
        }
    }

    /// Change the name of the mock backend.
    ///
    /// # Example
    ///
    /// ```
    /// use satchel_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::default().with_name("test");
    /// ```
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent operation fail with the given message.
    pub async fn set_failure(&self, message: impl Into<String>) {
        *self.failure.write().await = Some(message.into());
    }

    /// Make only listing fail, leaving the other operations working.
    /// Useful for exercising a mutation whose follow-up refetch breaks.
    pub async fn set_list_failure(&self, message: impl Into<String>) {
        *self.list_failure.write().await = Some(message.into());
    }

    /// Let operations succeed again.
    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
        *self.list_failure.write().await = None;
    }

    async fn check_failure(&self) -> Result<()> {
        if let Some(message) = self.failure.read().await.clone() {
            exn::bail!(ErrorKind::BackendError(message));
        }
        Ok(())
    }

    async fn check_list_failure(&self) -> Result<()> {
        self.check_failure().await?;
        if let Some(message) = self.list_failure.read().await.clone() {
            exn::bail!(ErrorKind::BackendError(message));
        }
        Ok(())
    }

    fn object_meta(key: &Path, object: &StoredObject) -> ObjectMeta {
        ObjectMeta::new(key, object.data.len() as u64)
            .with_created(object.created)
            .with_modified(object.modified)
            .with_custom(object.custom.clone())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, &str); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> ObjectMetaStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            if let Err(e) = self.check_list_failure().await {
                yield Err(e);
                return;
            }
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<ObjectMeta> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| match &validated_prefix {
                        Some(pfx) => key.starts_with(pfx),
                        None => true,
                    })
                    .map(|(key, object)| Self::object_meta(key, object))
                    .collect()
            };
            for meta in entries {
                yield Ok(meta);
            }
        })
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        self.check_failure().await?;
        let key = validate_path(key)?;
        Ok(self.storage.read().await.contains_key(&key))
    }

    async fn fetch(&self, key: &Path) -> Result<Vec<u8>> {
        self.check_failure().await?;
        let key = validate_path(key)?;
        let object =
            self.storage.read().await.get(&key).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))?;
        Ok(object.data)
    }

    async fn put(&self, key: &Path, data: &[u8], custom: &HashMap<String, String>) -> Result<()> {
        self.check_failure().await?;
        let key = validate_path(key)?;
        let mut guard = self.storage.write().await;
        if guard.contains_key(&key) {
            exn::bail!(ErrorKind::AlreadyExists(key));
        }
        let now = OffsetDateTime::now_utc();
        guard.insert(key, StoredObject { data: data.to_vec(), custom: custom.clone(), created: now, modified: now });
        Ok(())
    }

    async fn update_metadata(&self, key: &Path, custom: &HashMap<String, String>) -> Result<()> {
        self.check_failure().await?;
        let key = validate_path(key)?;
        let mut guard = self.storage.write().await;
        let object = guard.get_mut(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        object.custom = custom.clone();
        object.modified = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn remove(&self, keys: &[PathBuf]) -> Result<()> {
        self.check_failure().await?;
        let mut guard = self.storage.write().await;
        for key in keys {
            let key = validate_path(key)?;
            // Absent keys are skipped, matching S3 batch deletes.
            guard.remove(&key);
        }
        Ok(())
    }

    async fn stat(&self, key: &Path) -> Result<ObjectMeta> {
        self.check_failure().await?;
        let key = validate_path(key)?;
        let guard = self.storage.read().await;
        let object = guard.get(&key).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.clone())))?;
        Ok(Self::object_meta(&key, object))
    }
}
