//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for storage operations across different backends (local filesystem,
//! S3-compatible services, etc.).
//!

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::ObjectMeta;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

type ObjectMetaStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectMeta>> + Send + 'a>>;

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous to efficiently handle network
/// operations and concurrent access. The trait supports both local filesystem
/// and remote storage backends. Objects are opaque blobs addressed by key;
/// the only structure a backend is asked to preserve is the custom key/value
/// metadata attached to each object.
///
/// # Key Handling
/// All keys are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use satchel_storage::{StorageBackend, error::Result};
///
/// async fn size_of_hardcoded_object(backend: &dyn StorageBackend) -> Result<u64> {
///     let key = PathBuf::from("1756239000123-algebra-notes.pdf");
///     if backend.exists(&key).await? {
///         let data = backend.fetch(&key).await?;
///         Ok(data.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (name taken from the configuration
    /// object key). Each backend's name is **supposed** to be unique, but it
    /// doesn't affect the functionality of this crate if they aren't (used
    /// for logging only).
    fn name(&self) -> &str;

    /// List object metadata matching an optional prefix, windowed by
    /// `offset` and `limit`.
    ///
    /// Default implementation collects all the results from
    /// [`list_stream()`](Self::list_stream) into a [`Vec`], then applies the
    /// window. Backends with server-side pagination may override this to
    /// push the window down.
    async fn list(&self, prefix: Option<&Path>, limit: usize, offset: usize) -> Result<Vec<ObjectMeta>> {
        let all: Vec<ObjectMeta> = self.list_stream(prefix).try_collect().await?;
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    /// Stream object metadata matching an optional prefix.
    ///
    /// Returns metadata for all objects in the storage backend as a
    /// [`Stream`], yielding results incrementally and immediately. If a
    /// prefix is provided, only objects whose keys start with the prefix
    /// are returned.
    ///
    /// # Notes
    /// - the `prefix` argument may have varying behaviour depending
    ///   on the storage backend implementation used.
    /// - [`list()`](Self::list) is a convenience wrapper that collects this
    ///   stream via [`TryStreamExt`](futures::TryStreamExt::try_collect)
    ///   before returning all at once.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    ///
    /// // Filter by prefix
    /// let mut archived = backend.list_stream(Some(Path::new("archive/")));
    ///
    /// // Process objects one at a time
    /// let mut stream = backend.list_stream(None);
    /// while let Some(meta) = stream.try_next().await? {
    ///     println!("{}: {} bytes", meta.key.display(), meta.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> ObjectMetaStream<'a>;

    /// Check if an object exists.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// if backend.exists(Path::new("1756239000123-algebra-notes.pdf")).await? {
    ///     println!("Object exists!");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    async fn exists(&self, key: &Path) -> Result<bool>;

    /// Fetch the complete contents of an object as a [`Vec<u8>`].
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let data = backend.fetch(Path::new("1756239000123-algebra-notes.pdf")).await?;
    /// println!("Fetched {} bytes", data.len());
    /// # Ok(())
    /// # }
    /// ```
    async fn fetch(&self, key: &Path) -> Result<Vec<u8>>;

    /// Store a new object with the given contents and custom metadata.
    ///
    /// Uploads never overwrite: returns
    /// [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists) if the key
    /// is already present. Callers that want replacement semantics must
    /// [`remove`](Self::remove) first.
    ///
    /// # Notes
    /// - Implementations should create parent directories (or the key-prefix
    ///   equivalent) as needed.
    ///
    /// ```no_run
    /// use std::collections::HashMap;
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let custom = HashMap::from([("display_name".to_string(), "Algebra Notes".to_string())]);
    /// backend.put(Path::new("1756239000123-algebra-notes.pdf"), b"%PDF-1.7 ...", &custom).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn put(&self, key: &Path, data: &[u8], custom: &HashMap<String, String>) -> Result<()>;

    /// Replace an object's custom metadata without touching its contents.
    ///
    /// The whole custom map is replaced, not merged. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if the object does
    /// not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::collections::HashMap;
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let custom = HashMap::from([("subject".to_string(), "Maths".to_string())]);
    /// backend.update_metadata(Path::new("1756239000123-algebra-notes.pdf"), &custom).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn update_metadata(&self, key: &Path, custom: &HashMap<String, String>) -> Result<()>;

    /// Delete a batch of objects.
    ///
    /// Deletion is idempotent: keys that are already absent are skipped
    /// rather than reported as errors, matching S3 batch-delete semantics.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::PathBuf;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// backend.remove(&[PathBuf::from("1756239000123-algebra-notes.pdf")]).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn remove(&self, keys: &[PathBuf]) -> Result<()>;

    /// Get object metadata without fetching contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use satchel_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let meta = backend.stat(Path::new("1756239000123-algebra-notes.pdf")).await?;
    /// println!("Size: {} bytes", meta.size);
    /// # Ok(())
    /// # }
    /// ```
    async fn stat(&self, key: &Path) -> Result<ObjectMeta>;
}
