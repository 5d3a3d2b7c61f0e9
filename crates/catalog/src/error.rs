//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use satchel_storage::error::Error as StorageError;

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Display names must still contain something after trimming.
    #[display("display name must not be empty")]
    EmptyDisplayName,
    /// Only PDF files belong in the catalog.
    #[display("not a PDF file: {_0}")]
    NotPdf(#[error(not(source))] String),
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
    /// The storage backend reported a failure. Carries the backend's own
    /// message verbatim, since that is what gets surfaced to the user.
    #[display("{_0}")]
    Storage(#[error(not(source))] String),
}

impl ErrorKind {
    /// Convert a storage error into a catalog error, preserving the storage
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        let message = (*err).to_string();
        err.raise(ErrorKind::Storage(message))
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Validation and parse failures are deterministic; only the backend
        // can transiently misbehave.
        matches!(self, Self::Storage(_))
    }
}
