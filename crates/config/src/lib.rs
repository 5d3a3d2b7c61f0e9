//! Configuration loading and storage backend construction.
//!
//! Configuration merges two sources, later ones winning: a YAML file
//! (an explicit path, or the platform config directory), then
//! `SATCHEL_`-prefixed environment variables. A session bootstraps by
//! loading a [`Config`] and calling [`Config::connect`] to obtain the
//! backend handle its catalog will own.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use satchel_storage::BackendHandle;
use satchel_storage::backend::LocalBackend;
#[cfg(feature = "s3")]
use satchel_storage::backend::S3Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name looked for in the platform config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";
/// Prefix for environment overrides. Nested keys split on a double
/// underscore, so `SATCHEL_BACKEND__ROOT` sets `backend.root`.
const ENV_PREFIX: &str = "SATCHEL_";

/// Top-level configuration.
///
/// # Examples
///
/// ```yaml
/// backend:
///   type: local
///   root: /srv/satchel/objects
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Which storage backend to construct, and how.
    pub backend: BackendConfig,
}

/// Storage backend selection, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Objects as plain files under an absolute root directory.
    Local {
        /// Absolute path to the storage root.
        root: PathBuf,
    },
    /// An S3-compatible object store (AWS S3, Backblaze B2, MinIO, ...).
    #[cfg(feature = "s3")]
    S3 {
        /// Bucket name.
        bucket: String,
        /// AWS region, or the provider-specific equivalent.
        region: String,
        /// Optional key prefix acting as a virtual directory.
        #[serde(default)]
        prefix: Option<String>,
        /// Custom endpoint URL for non-AWS services.
        #[serde(default)]
        endpoint: Option<String>,
        /// Access key ID.
        key_id: String,
        /// Secret access key.
        key_secret: String,
    },
}

impl Config {
    /// Load configuration from a YAML file merged with environment
    /// overrides.
    ///
    /// With an explicit `path` the file must exist. Without one, the
    /// platform config directory is consulted and a missing file is fine;
    /// the environment alone can carry a complete configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(explicit) => {
                if !explicit.is_file() {
                    exn::bail!(ErrorKind::Read(explicit.to_path_buf()));
                }
                Some(explicit.to_path_buf())
            },
            None => Self::default_path(),
        };

        let mut figment = Figment::new();
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "reading configuration file");
            figment = figment.merge(Yaml::file(file));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| exn::Exn::from(ErrorKind::Malformed(e.to_string())))
    }

    /// Default configuration file location for this platform, if one can
    /// be determined. `None` on unusual systems with no home directory;
    /// loading then falls back to environment variables only.
    fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "satchel").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Construct the configured storage backend.
    pub async fn connect(&self) -> Result<BackendHandle> {
        Ok(match &self.backend {
            BackendConfig::Local { root } => {
                let backend = LocalBackend::new("local", root).map_err(ErrorKind::storage)?;
                tracing::debug!(root = %root.display(), "connected local backend");
                Arc::new(backend)
            },
            #[cfg(feature = "s3")]
            BackendConfig::S3 { bucket, region, prefix, endpoint, key_id, key_secret } => {
                let backend = S3Backend::new(
                    "s3",
                    bucket.clone(),
                    prefix.clone(),
                    region.clone(),
                    endpoint.clone(),
                    key_id.clone(),
                    key_secret.clone(),
                )
                .await
                .map_err(ErrorKind::storage)?;
                tracing::debug!(%bucket, %region, "connected S3 backend");
                Arc::new(backend)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_storage::StorageBackend;

    #[test]
    fn test_load_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "backend:\n  type: local\n  root: /srv/satchel/objects\n")?;
            let config = Config::load(Some(Path::new("config.yaml"))).expect("load");
            assert_eq!(
                config.backend,
                BackendConfig::Local { root: PathBuf::from("/srv/satchel/objects") },
            );
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "backend:\n  type: local\n  root: /srv/satchel/objects\n")?;
            jail.set_env("SATCHEL_BACKEND__ROOT", "/elsewhere");
            let config = Config::load(Some(Path::new("config.yaml"))).expect("load");
            assert_eq!(config.backend, BackendConfig::Local { root: PathBuf::from("/elsewhere") });
            Ok(())
        });
    }

    #[test]
    fn test_environment_alone_is_enough() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SATCHEL_BACKEND__TYPE", "local");
            jail.set_env("SATCHEL_BACKEND__ROOT", "/srv/satchel/objects");
            let config = Config::load(None).expect("load");
            assert_eq!(
                config.backend,
                BackendConfig::Local { root: PathBuf::from("/srv/satchel/objects") },
            );
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Read(_)));
    }

    #[test]
    fn test_unknown_backend_type_is_malformed() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "backend:\n  type: carrier-pigeon\n")?;
            let err = Config::load(Some(Path::new("config.yaml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Malformed(_)));
            Ok(())
        });
    }

    #[test]
    fn test_missing_backend_section_is_malformed() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "{}")?;
            let err = Config::load(Some(Path::new("config.yaml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Malformed(_)));
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_connect_local_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config { backend: BackendConfig::Local { root: temp_dir.path().to_path_buf() } };
        let handle = config.connect().await.unwrap();
        assert_eq!(handle.name(), "local");
    }

    #[tokio::test]
    async fn test_connect_local_backend_rejects_relative_root() {
        let config = Config { backend: BackendConfig::Local { root: PathBuf::from("relative/root") } };
        let err = config.connect().await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage(_)));
    }
}
