//! Pure derived views over a snapshot of catalog records.
//!
//! Everything here takes a slice and returns a fresh `Vec`; nothing mutates
//! the catalog's own list. Views are recomputed from raw records on every
//! call instead of cached incrementally, so they can never go stale.

use crate::error::{Error, ErrorKind};
use crate::record::FileRecord;
use crate::sanitize;
use crate::subject::Subject;
use std::str::FromStr;

/// Subject restriction for [`filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectFilter {
    /// No subject restriction.
    All,
    /// Only records tagged with this subject.
    Only(Subject),
}
impl FromStr for SubjectFilter {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if sanitize(s) == "all" {
            return Ok(Self::All);
        }
        Ok(Self::Only(s.parse()?))
    }
}

/// Field to order records by. Each key has a fixed direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Display name, case-insensitive, ascending.
    Name,
    /// Creation time, newest first.
    Date,
    /// Size in bytes, largest first.
    Size,
    /// Subject display name, ascending.
    Subject,
}
impl FromStr for SortKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = sanitize(s);
        Ok(match sanitized.as_str() {
            "name" => Self::Name,
            "date" => Self::Date,
            "size" => Self::Size,
            "subject" => Self::Subject,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "sort",
                value: format!("unknown sort key: {}", s)
            }),
        })
    }
}

/// Restrict records by subject and search term.
///
/// [`SubjectFilter::All`] applies no subject restriction. A non-empty
/// `search` keeps only records whose display name contains it,
/// case-insensitively; the term is matched as-is, without trimming.
pub fn filter(records: &[FileRecord], subject: SubjectFilter, search: &str) -> Vec<FileRecord> {
    let needle = search.to_lowercase();
    records
        .iter()
        .filter(|record| match subject {
            SubjectFilter::All => true,
            SubjectFilter::Only(s) => record.subject == s,
        })
        .filter(|record| needle.is_empty() || record.display_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Order records by the given key. Stable: ties keep their relative order
/// from the input.
///
/// Name ordering folds case via `to_lowercase`, which handles Unicode
/// simple case mapping; full locale collation is out of scope here.
pub fn sort(records: &[FileRecord], key: SortKey) -> Vec<FileRecord> {
    let mut sorted = records.to_vec();
    match key {
        SortKey::Name => sorted.sort_by_cached_key(|record| record.display_name.to_lowercase()),
        SortKey::Date => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Size => sorted.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
        SortKey::Subject => sorted.sort_by_key(|record| record.subject.as_str()),
    }
    sorted
}

/// Per-subject record counts.
///
/// Total over the subject enumeration: every subject reports a count, zero
/// included, so consumers can render a complete tab row without probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubjectCounts {
    total: usize,
    counts: [usize; Subject::ALL.len()],
}
impl SubjectCounts {
    /// Count of all records, the "All" bucket.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Count of records tagged with one subject.
    pub fn get(&self, subject: Subject) -> usize {
        self.counts[subject as usize]
    }

    /// `(subject, count)` pairs in display order, zeros included.
    pub fn iter(&self) -> impl Iterator<Item = (Subject, usize)> + '_ {
        Subject::ALL.iter().map(|subject| (*subject, self.get(*subject)))
    }
}

/// Tally records into per-subject counts.
pub fn count_by_subject(records: &[FileRecord]) -> SubjectCounts {
    let mut counts = SubjectCounts::default();
    for record in records {
        counts.total += 1;
        counts.counts[record.subject as usize] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use time::OffsetDateTime;

    fn make_test_record(name: &str, subject: Subject, size: u64, created: i64) -> FileRecord {
        let created_at = OffsetDateTime::from_unix_timestamp(created).unwrap();
        FileRecord {
            id: format!("{created}-{}.pdf", name.to_lowercase()),
            display_name: name.to_string(),
            storage_key: PathBuf::from(format!("{created}-{}.pdf", name.to_lowercase())),
            subject,
            size_bytes: size,
            created_at,
            updated_at: created_at,
        }
    }

    fn make_test_records() -> Vec<FileRecord> {
        vec![
            make_test_record("Algebra Notes", Subject::Maths, 2048, 300),
            make_test_record("Physics", Subject::Science, 4096, 100),
            make_test_record("Algorithms", Subject::Computer, 1024, 200),
            make_test_record("grammar drills", Subject::English, 512, 400),
        ]
    }

    #[test]
    fn test_filter_all_with_empty_search_is_identity() {
        let records = make_test_records();
        let filtered = filter(&records, SubjectFilter::All, "");
        assert_eq!(filtered, records);
    }

    #[test]
    fn test_filter_by_subject_is_complete() {
        let mut records = make_test_records();
        records.push(make_test_record("Geometry", Subject::Maths, 100, 500));
        let filtered = filter(&records, SubjectFilter::Only(Subject::Maths), "");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|record| record.subject == Subject::Maths));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let records = make_test_records();
        let filtered = filter(&records, SubjectFilter::All, "alg");
        let names: Vec<_> = filtered.iter().map(|record| record.display_name.as_str()).collect();
        assert_eq!(names, vec!["Algebra Notes", "Algorithms"]);
    }

    #[test]
    fn test_filter_search_combines_with_subject() {
        let records = make_test_records();
        let filtered = filter(&records, SubjectFilter::Only(Subject::Computer), "alg");
        let names: Vec<_> = filtered.iter().map(|record| record.display_name.as_str()).collect();
        assert_eq!(names, vec!["Algorithms"]);
    }

    #[test]
    fn test_filter_does_not_trim_search() {
        let records = make_test_records();
        // A whitespace-padded term is a real (failing) search, not "no search".
        assert!(filter(&records, SubjectFilter::All, " alg ").is_empty());
    }

    #[test]
    fn test_sort_by_name_folds_case() {
        let sorted = sort(&make_test_records(), SortKey::Name);
        let names: Vec<_> = sorted.iter().map(|record| record.display_name.as_str()).collect();
        assert_eq!(names, vec!["Algebra Notes", "Algorithms", "grammar drills", "Physics"]);
    }

    #[test]
    fn test_sort_by_date_newest_first() {
        let sorted = sort(&make_test_records(), SortKey::Date);
        let created: Vec<_> = sorted.iter().map(|record| record.created_at.unix_timestamp()).collect();
        assert_eq!(created, vec![400, 300, 200, 100]);
    }

    #[test]
    fn test_sort_by_date_keeps_tied_order() {
        let records = vec![
            make_test_record("First", Subject::Maths, 1, 100),
            make_test_record("Second", Subject::Maths, 2, 100),
            make_test_record("Newer", Subject::Maths, 3, 200),
            make_test_record("Third", Subject::Maths, 4, 100),
        ];
        let sorted = sort(&records, SortKey::Date);
        let names: Vec<_> = sorted.iter().map(|record| record.display_name.as_str()).collect();
        assert_eq!(names, vec!["Newer", "First", "Second", "Third"]);
    }

    #[test]
    fn test_sort_by_size_largest_first() {
        let sorted = sort(&make_test_records(), SortKey::Size);
        let sizes: Vec<_> = sorted.iter().map(|record| record.size_bytes).collect();
        assert_eq!(sizes, vec![4096, 2048, 1024, 512]);
    }

    #[test]
    fn test_sort_by_subject_ascending() {
        let sorted = sort(&make_test_records(), SortKey::Subject);
        let subjects: Vec<_> = sorted.iter().map(|record| record.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Computer", "English", "Maths", "Science"]);
    }

    #[rstest]
    #[case(SortKey::Name)]
    #[case(SortKey::Date)]
    #[case(SortKey::Size)]
    #[case(SortKey::Subject)]
    fn test_sort_is_idempotent(#[case] key: SortKey) {
        let once = sort(&make_test_records(), key);
        let twice = sort(&once, key);
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case(SortKey::Name)]
    #[case(SortKey::Date)]
    #[case(SortKey::Size)]
    #[case(SortKey::Subject)]
    fn test_sort_is_a_permutation(#[case] key: SortKey) {
        let records = make_test_records();
        let sorted = sort(&records, key);
        assert_eq!(sorted.len(), records.len());
        for record in &records {
            assert!(sorted.contains(record));
        }
    }

    #[test]
    fn test_counts_cover_the_whole_enumeration() {
        let records = make_test_records();
        let counts = count_by_subject(&records);
        assert_eq!(counts.total(), records.len());
        assert_eq!(counts.get(Subject::Maths), 1);
        assert_eq!(counts.get(Subject::Hindi), 0);
        let sum: usize = counts.iter().map(|(_, count)| count).sum();
        assert_eq!(sum, records.len());
        assert_eq!(counts.iter().count(), Subject::ALL.len());
    }

    #[test]
    fn test_counts_of_empty_list() {
        let counts = count_by_subject(&[]);
        assert_eq!(counts.total(), 0);
        assert!(counts.iter().all(|(_, count)| count == 0));
    }

    #[rstest]
    #[case("All", SubjectFilter::All)]
    #[case("all", SubjectFilter::All)]
    #[case("Maths", SubjectFilter::Only(Subject::Maths))]
    fn test_parse_subject_filter(#[case] input: &str, #[case] expected: SubjectFilter) {
        assert_eq!(input.parse::<SubjectFilter>().unwrap(), expected);
    }

    #[rstest]
    #[case("name", SortKey::Name)]
    #[case("Date", SortKey::Date)]
    #[case("SIZE", SortKey::Size)]
    #[case("subject", SortKey::Subject)]
    fn test_parse_sort_key(#[case] input: &str, #[case] expected: SortKey) {
        assert_eq!(input.parse::<SortKey>().unwrap(), expected);
    }

    #[test]
    fn test_parse_sort_key_unknown() {
        let err = "alphabetical".parse::<SortKey>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "sort", .. }));
    }
}
