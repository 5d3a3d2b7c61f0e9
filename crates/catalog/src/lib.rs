mod catalog;
pub mod error;
mod key;
pub mod query;
mod record;
mod subject;

pub use crate::catalog::Catalog;
pub use crate::key::is_pdf;
pub use crate::query::{SortKey, SubjectCounts, SubjectFilter};
pub use crate::record::FileRecord;
pub use crate::subject::Subject;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('/', "").replace('-', "").replace('_', "").replace(' ', "")
}
