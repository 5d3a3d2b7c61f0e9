//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file. Each
//! backend specifies its own `key_id` and `key_secret`.
//!
//! TODO: Future iteration - support `credentials: "profile:name"` in config
//! to use AWS SDK credential providers for actual AWS S3 targets.
//! This would allow using ~/.aws/credentials profiles instead of explicit keys.
//! Not implemented now since we primarily target Backblaze/Tigris which use
//! explicit credentials, and the credential chain is inherently single-account
//! which doesn't fit well with multiple heterogeneous backends.

use crate::{
    ObjectMeta, StorageBackend,
    backend::ObjectMetaStream,
    error::{ErrorKind, Result},
    validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::head_object::HeadObjectOutput,
    primitives::{ByteStream, DateTime},
    types::{Delete, MetadataDirective, ObjectIdentifier},
};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
///
/// TODO: Adaptive rate limiting based on 429/throttling responses?
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// How many metadata HEAD requests to keep in flight while listing. LIST
/// responses carry no user metadata, so every object needs a follow-up HEAD.
const METADATA_FETCH_CONCURRENCY: usize = 16;

/// Hard S3 limit on keys per DeleteObjects request.
const MAX_DELETE_BATCH: usize = 1000;

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All keys
/// are relative to the configured prefix (if any).
///
/// # Supported Services
///
/// - AWS S3
/// - Backblaze B2 (via S3-compatible API)
/// - Tigris (Fly.io storage)
/// - MinIO
/// - Other S3-compatible services
///
/// # Examples
///
/// ```no_run
/// use satchel_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "my-storage",
///     "my-bucket",
///     Some("materials/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in display/logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidKey(p)))
            .transpose()?;
        let name = name.into();
        let bucket = bucket.into();
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "satchel-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        // Set custom endpoint for non-AWS services
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(config_builder.build());
        let rate_limiter = Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS));
        Ok(Self {
            name,
            client,
            bucket,
            prefix,
            rate_limiter,
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &Path) -> Result<String> {
        let validated = validate_path(key)?;
        let key_str = validated.to_str().ok_or_raise(|| ErrorKind::InvalidKey(validated.clone()))?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key_str),
            None => key_str.to_string(),
        })
    }

    /// Strip the configured prefix from an S3 key to get the relative key.
    fn relative_path(&self, key: &str) -> Result<PathBuf> {
        let relative = match &self.prefix {
            Some(prefix) => {
                let prefix_normalized = prefix.trim_end_matches('/');
                key.strip_prefix(prefix_normalized).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
            },
            None => key,
        };
        validate_path(relative)
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        // unwrap is safe: semaphore is never closed
        self.rate_limiter.clone().acquire_owned().await.unwrap()
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    /// Classify an SDK error into the backend-agnostic error kinds.
    ///
    /// Transport-level failures become [`ErrorKind::Network`]; service
    /// responses are classified by their error code. S3-compatible services
    /// are inconsistent about codes for missing objects, hence both
    /// `NoSuchKey` and `NotFound`.
    fn map_sdk_error<E>(err: SdkError<E>, key: &Path) -> ErrorKind
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        if matches!(&err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)) {
            return ErrorKind::Network(format!("{}", DisplayErrorContext(&err)));
        }
        match err.code() {
            Some("NoSuchKey") | Some("NotFound") => ErrorKind::NotFound(key.to_path_buf()),
            Some("AccessDenied") => ErrorKind::PermissionDenied(key.to_path_buf()),
            // `If-None-Match: *` rejections on conditional writes.
            Some("PreconditionFailed") => ErrorKind::AlreadyExists(key.to_path_buf()),
            _ => ErrorKind::BackendError(format!("{}", DisplayErrorContext(&err))),
        }
    }

    fn object_meta_from_head(key: PathBuf, head: &HeadObjectOutput) -> Result<ObjectMeta> {
        let size = head.content_length().unwrap_or_default().max(0) as u64;
        let mut meta = ObjectMeta::new(key, size);
        // S3 has no creation time; last-modified is all we get.
        if let Some(last_modified) = head.last_modified() {
            meta = meta.with_modified(Self::parse_datetime(last_modified)?);
        }
        if let Some(custom) = head.metadata() {
            meta = meta.with_custom(custom.clone());
        }
        Ok(meta)
    }

    /// Fetch full metadata for one listed key.
    async fn enrich(&self, key: String) -> Result<ObjectMeta> {
        let relative = self.relative_path(&key)?;
        self.stat(&relative).await
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> ObjectMetaStream<'a> {
        let list_prefix = match prefix.map(|p| self.full_key(p)).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        // No caller prefix still means listing under the configured one.
        let list_prefix = list_prefix.or_else(|| self.prefix.clone());

        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let mut request = self.client.list_objects_v2().bucket(&self.bucket);
                if let Some(prefix) = &list_prefix {
                    request = request.prefix(prefix);
                }
                if let Some(token) = continuation.take() {
                    request = request.continuation_token(token);
                }
                let page = {
                    let _permit = self.acquire_permit().await;
                    request.send().await
                };
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::map_sdk_error(e, Path::new(&self.bucket))));
                        return;
                    },
                };

                let keys: Vec<String> = page
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string))
                    // "Directory" placeholder objects some consoles create.
                    .filter(|key| !key.ends_with('/'))
                    .collect();
                // LIST results carry no user metadata, so enrich each key
                // with a HEAD request, a bounded number in flight at once.
                let enriched = futures::stream::iter(keys.into_iter().map(|key| self.enrich(key)))
                    .buffered(METADATA_FETCH_CONCURRENCY);
                for await result in enriched {
                    yield result;
                }

                continuation = page.next_continuation_token().map(str::to_string);
                if continuation.is_none() {
                    break;
                }
            }
        })
    }

    async fn exists(&self, key: &Path) -> Result<bool> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        match self.client.head_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(_) => Ok(true),
            // HEAD failures often arrive without an error code in the body,
            // so go through the modeled variant instead of `map_sdk_error`.
            Err(SdkError::ServiceError(ref context)) if context.err().is_not_found() => Ok(false),
            Err(e) => Err(exn::Exn::from(Self::map_sdk_error(e, key))),
        }
    }

    async fn fetch(&self, key: &Path) -> Result<Vec<u8>> {
        let validated = validate_path(key)?;
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let object = match self.client.get_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(object) => object,
            Err(SdkError::ServiceError(ref context)) if context.err().is_no_such_key() => {
                exn::bail!(ErrorKind::NotFound(validated))
            },
            Err(e) => return Err(exn::Exn::from(Self::map_sdk_error(e, key))),
        };
        let data = object
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network("failed to stream object body".to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn put(&self, key: &Path, data: &[u8], custom: &HashMap<String, String>) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(data.to_vec()))
            // Fail with 412 instead of silently replacing an existing object.
            .if_none_match("*");
        for (k, v) in custom {
            request = request.metadata(k, v);
        }
        request.send().await.map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    async fn update_metadata(&self, key: &Path, custom: &HashMap<String, String>) -> Result<()> {
        let full_key = self.full_key(key)?;
        // A self-copy with a Replace directive is how S3 rewrites metadata.
        // The source is a URL path, so the raw key needs encoding.
        let copy_source = format!("{}/{}", self.bucket, urlencoding::encode(&full_key));
        let _permit = self.acquire_permit().await;
        let mut request = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(&full_key)
            .metadata_directive(MetadataDirective::Replace);
        for (k, v) in custom {
            request = request.metadata(k, v);
        }
        request.send().await.map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    async fn remove(&self, keys: &[PathBuf]) -> Result<()> {
        // DeleteObjects skips keys that don't exist, so no existence
        // filtering is needed here.
        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let mut objects = Vec::with_capacity(batch.len());
            for key in batch {
                let identifier = ObjectIdentifier::builder()
                    .key(self.full_key(key)?)
                    .build()
                    .or_raise(|| ErrorKind::BackendError("failed to build delete request".to_string()))?;
                objects.push(identifier);
            }
            let delete = Delete::builder()
                .set_objects(Some(objects))
                // Only report per-key failures, not successes.
                .quiet(true)
                .build()
                .or_raise(|| ErrorKind::BackendError("failed to build delete request".to_string()))?;
            let _permit = self.acquire_permit().await;
            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, Path::new(&self.bucket)))?;
            let errors = response.errors();
            if !errors.is_empty() {
                let first = &errors[0];
                exn::bail!(ErrorKind::BackendError(format!(
                    "failed to delete {} object(s), first: {} ({})",
                    errors.len(),
                    first.key().unwrap_or("<unknown>"),
                    first.message().unwrap_or("no message"),
                )));
            }
        }
        Ok(())
    }

    async fn stat(&self, key: &Path) -> Result<ObjectMeta> {
        let validated = validate_path(key)?;
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await;
        let head = match self.client.head_object().bucket(&self.bucket).key(&full_key).send().await {
            Ok(head) => head,
            Err(SdkError::ServiceError(ref context)) if context.err().is_not_found() => {
                exn::bail!(ErrorKind::NotFound(validated))
            },
            Err(e) => return Err(exn::Exn::from(Self::map_sdk_error(e, key))),
        };
        Self::object_meta_from_head(validated, &head)
    }
}
