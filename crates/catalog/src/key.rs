//! Storage key construction and PDF extension filtering.

use rslug::slugify;
use std::path::Path;
use time::OffsetDateTime;

const PDF_EXTENSION: &str = "pdf";

/// Check whether a file name or storage key looks like a PDF.
///
/// Only the extension is inspected, case-insensitively:
/// - `notes.pdf` -> true
/// - `NOTES.PDF` -> true
/// - `notes.pdf.bak` -> false
/// - `notes` -> false
pub fn is_pdf(name: impl AsRef<Path>) -> bool {
    name.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// Build a unique storage key for an upload.
///
/// A millisecond timestamp prefix keeps new keys from colliding with
/// existing ones; the original file name is slugged into a readable tail so
/// the key stays recognizable in bucket listings. File names that slug away
/// to nothing fall back to `file`.
pub fn generate(file_name: &str, at: OffsetDateTime) -> String {
    let stem = Path::new(file_name).file_stem().and_then(|stem| stem.to_str()).unwrap_or("file");
    let mut slug = slugify!(stem);
    if slug.is_empty() {
        slug = "file".to_string();
    }
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("{millis}-{slug}.pdf")
}
