//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use satchel_storage::error::Error as StorageError;
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration file could not be read
    #[display("cannot read configuration file: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// Configuration was read but did not deserialize
    #[display("malformed configuration: {_0}")]
    Malformed(#[error(not(source))] String),
    /// Storage backend could not be constructed from the configuration
    #[display("{_0}")]
    Storage(#[error(not(source))] String),
}

impl ErrorKind {
    /// Convert a storage error into a configuration error, preserving the
    /// storage crate's `Exn` frame (error tree) as a child in its own tree.
    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        let message = (*err).to_string();
        err.raise(ErrorKind::Storage(message))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A file that won't read or parse stays that way; only backend
        // construction can transiently fail.
        matches!(self, Self::Storage(_))
    }
}
