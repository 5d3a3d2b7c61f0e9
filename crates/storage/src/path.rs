//! Key validation and security utilities.
//!
//! Storage keys are relative paths. This module makes sure a key can never
//! address anything outside the storage root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage key for security and correctness.
/// Ensures that keys don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized key if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use satchel_storage::validate_path;
/// // Valid keys
/// assert!(validate_path("1756239000123-algebra-notes.pdf").is_ok());
/// assert!(validate_path("archive/2025/notes.pdf").is_ok());
/// assert!(validate_path("a/../notes.pdf").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves the root)
/// assert!(validate_path("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././correct//./notes.pdf/").unwrap(),
///     Path::new("correct/notes.pdf")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    // Rust's own component parser handles the separator and encoding edge
    // cases, so the only work left is tracking the depth of the key.
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // strings in C-based syscalls. Reject them outright.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidKey(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            // Drive letters and UNC paths have no business in a storage key.
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidKey(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate(Path::new("1756239000123-notes.pdf")).unwrap(), Path::new("1756239000123-notes.pdf"));
        assert_eq!(validate(Path::new("archive/2025/notes.pdf")).unwrap(), Path::new("archive/2025/notes.pdf"));
        assert_eq!(validate(Path::new("plain.pdf")).unwrap(), Path::new("plain.pdf"));
    }

    #[test]
    fn test_key_normalization() {
        // Double slashes are normalized
        assert_eq!(validate(Path::new("a//b//c")).unwrap(), Path::new("a/b/c"));
        // Current directory references removed
        assert_eq!(validate(Path::new("a/./b/./c")).unwrap(), Path::new("a/b/c"));
    }

    #[test]
    fn test_traversal_attempts() {
        // Basic parent directory reference
        assert!(validate(Path::new("../etc/passwd")).is_err());
        // Traversal in the middle
        assert!(validate(Path::new("a/../../b")).is_err());
        // Only parent references
        assert!(validate(Path::new("..")).is_err());
        assert!(validate(Path::new("../..")).is_err());
    }

    #[test]
    fn test_traversal_within_root() {
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
        assert_eq!(validate(Path::new("a/../notes.pdf")).unwrap(), Path::new("notes.pdf"));
    }

    #[test]
    fn test_invalid_characters() {
        // Null byte
        assert!(validate(Path::new("a\0b")).is_err());
        assert!(validate(Path::new("\0")).is_err());
    }

    #[test]
    fn test_empty_keys() {
        // Empty string
        assert!(validate(Path::new("")).is_err());
        // Only dots and slashes (normalizes to empty)
        assert!(validate(Path::new(".")).is_err());
        assert!(validate(Path::new("./")).is_err());
        assert!(validate(Path::new("./.")).is_err());
        assert!(validate(Path::new("//")).is_err());
    }

    #[test]
    fn test_trailing_slashes() {
        assert_eq!(validate(Path::new("archive/")).unwrap(), Path::new("archive"));
        assert_eq!(validate(Path::new("a/b/c/")).unwrap(), Path::new("a/b/c"));
        assert_eq!(validate(Path::new("notes.pdf/")).unwrap(), Path::new("notes.pdf"));
        assert_eq!(validate(Path::new("archive///")).unwrap(), Path::new("archive"));
    }
}
