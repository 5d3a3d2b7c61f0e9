//! Local filesystem storage backend.
//!
//! Objects live as plain files under a configured root directory, accessed
//! via `tokio::fs` for async I/O. Custom metadata has no native home on a
//! filesystem, so each object's map is persisted as a JSON sidecar document
//! under a reserved `.meta/` subtree that mirrors the object tree.

use crate::backend::ObjectMetaStream;
use crate::error::ErrorKind;
use crate::{ObjectMeta, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashMap;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Reserved subtree holding metadata sidecar documents. Keys are not allowed
/// to start with this component.
const META_DIR: &str = ".meta";

enum WalkEntry {
    Object(ObjectMeta),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Stores objects in a directory on the local filesystem. All keys are
/// relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use satchel_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/path/to/vault")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for stored objects
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Arguments
    /// * `root` - Absolute path to the storage root directory
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root));
        }

        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root));
            }
        } else {
            // Use non-async here; it'll only happen once on backend
            // initialization and it's not worth the hassle of making the
            // constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Validate a key and reject anything under the reserved metadata tree.
    fn validated(&self, key: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(key.as_ref())?;
        if validated.starts_with(META_DIR) {
            exn::bail!(ErrorKind::InvalidKey(validated));
        }
        Ok(validated)
    }

    /// Absolute filesystem path holding the object's contents.
    fn object_path(&self, validated: &Path) -> PathBuf {
        self.root.join(validated)
    }

    /// Absolute filesystem path holding the object's metadata sidecar.
    ///
    /// Mirrors the object tree under [`META_DIR`] with `.json` appended, so
    /// `archive/notes.pdf` maps to `.meta/archive/notes.pdf.json`.
    fn metadata_path(&self, validated: &Path) -> PathBuf {
        let mut file_name = validated.as_os_str().to_os_string();
        file_name.push(".json");
        self.root.join(META_DIR).join(file_name)
    }

    /// Convert an absolute path back to a relative storage key.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        if !absolute.is_absolute() {
            exn::bail!(ErrorKind::BackendError(format!(
                "attempting to get relative path of non-absolute path `{:?}`",
                absolute
            )))
        }
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        // Validate path will also canonicalize it.
        Ok(validate_path(relative)?)
    }

    /// Re-use the same data collection from file metadata for both list and
    /// stat functions. Timestamps are best-effort: not every filesystem
    /// records a birth time.
    fn object_meta(key: &Path, metadata: &Metadata, custom: HashMap<String, String>) -> ObjectMeta {
        let mut meta = ObjectMeta::new(key, metadata.len()).with_custom(custom);
        if let Ok(modified) = metadata.modified() {
            meta = meta.with_modified(modified.into());
        }
        if let Ok(created) = metadata.created() {
            meta = meta.with_created(created.into());
        }
        meta
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            IoErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Load an object's custom metadata map from its sidecar.
    ///
    /// A missing sidecar is simply an empty map. A sidecar that cannot be
    /// parsed also degrades to an empty map (with a warning) so that one
    /// corrupt document can't take down a whole listing; the object itself
    /// is untouched.
    async fn read_custom(&self, key: &Path) -> HashMap<String, String> {
        let document = match fs::read(self.metadata_path(key)).await {
            Ok(bytes) => bytes,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_slice(&document) {
            Ok(custom) => custom,
            Err(err) => {
                tracing::warn!(key = %key.display(), %err, "ignoring unreadable metadata sidecar");
                HashMap::new()
            },
        }
    }

    /// Persist an object's custom metadata map to its sidecar.
    ///
    /// An empty map means no sidecar at all.
    async fn write_custom(&self, key: &Path, custom: &HashMap<String, String>) -> Result<()> {
        let meta_path = self.metadata_path(key);
        if custom.is_empty() {
            return match fs::remove_file(&meta_path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
                Err(e) => Err(exn::Exn::from(Self::map_io_error(e, key))),
            };
        }
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        let document = serde_json::to_vec(custom)
            .or_raise(|| ErrorKind::BackendError("failed to encode metadata sidecar".to_string()))?;
        Ok(fs::write(&meta_path, document).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    /// Classify a directory entry for the listing walk. Extracting this out
    /// of the stream loop keeps `?` usable; inside the loop every error has
    /// to be converted and yielded by hand.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        // The sidecar tree is an implementation detail, never a listed object.
        if relative.starts_with(META_DIR) {
            return Ok(WalkEntry::Skip);
        }
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            let custom = self.read_custom(&relative).await;
            return Ok(WalkEntry::Object(Self::object_meta(&relative, &metadata, custom)));
        }
        // Note: silently drop what is most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> ObjectMetaStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };

        let start_dir = validated_prefix
            .as_ref()
            // Walk from the parent directory of the prefix path. Ensures
            // prefix is a directory and avoids erroring on prefixes where
            // the leaf component doesn't exist yet or is a file.
            // So the prefix "notes/alg" would become a starting
            // directory of "notes" and match:
            // - [MATCH] "notes/alg/week1.pdf"
            // - [MATCH] "notes/alg" (could be file)
            // - [NOT MATCH] "notes/algebra/week1.pdf" (Path::starts_with is component-based)
            .map(|prefix| self.root.join(prefix).parent().unwrap_or_else(|| &self.root).to_path_buf())
            .unwrap_or_else(|| self.root.clone());
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // To stay consistent with the behaviour of S3-compatible
                    // backends, asking for the contents of a directory that
                    // doesn't exist results in an empty list not an error.
                    Err(err) if err.kind() == IoErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::Object(meta)) => yield Ok(meta),
                        Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let key = self.validated(key)?;
        Ok(fs::try_exists(self.object_path(&key)).await.map_err(ErrorKind::Io)?)
    }

    async fn fetch(&self, key: &Path) -> Result<Vec<u8>> {
        let key = self.validated(key)?;
        Ok(fs::read(self.object_path(&key)).await.map_err(|e| Self::map_io_error(e, &key))?)
    }

    async fn put(&self, key: &Path, data: &[u8], custom: &HashMap<String, String>) -> Result<()> {
        let key = self.validated(key)?;
        let object_path = self.object_path(&key);
        if fs::try_exists(&object_path).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(key));
        }
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, &key))?;
        }
        fs::write(&object_path, data).await.map_err(|e| Self::map_io_error(e, &key))?;
        self.write_custom(&key, custom).await
    }

    async fn update_metadata(&self, key: &Path, custom: &HashMap<String, String>) -> Result<()> {
        let key = self.validated(key)?;
        if !fs::try_exists(self.object_path(&key)).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(key));
        }
        self.write_custom(&key, custom).await
    }

    async fn remove(&self, keys: &[PathBuf]) -> Result<()> {
        for key in keys {
            let key = self.validated(key)?;
            match fs::remove_file(self.object_path(&key)).await {
                Ok(()) => {},
                // Removing an absent key is a no-op, matching S3 batch deletes.
                Err(e) if e.kind() == IoErrorKind::NotFound => continue,
                Err(e) => return Err(exn::Exn::from(Self::map_io_error(e, &key))),
            }
            // Sidecar cleanup is best-effort; a stale sidecar is unreachable.
            _ = fs::remove_file(self.metadata_path(&key)).await;
        }
        Ok(())
    }

    async fn stat(&self, key: &Path) -> Result<ObjectMeta> {
        let key = self.validated(key)?;
        let metadata = fs::metadata(self.object_path(&key)).await.map_err(|e| Self::map_io_error(e, &key))?;
        let custom = self.read_custom(&key).await;
        Ok(Self::object_meta(&key, &metadata, custom))
    }
}
