use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use crate::error::{Error, ErrorKind};
use crate::sanitize;

/// Subject tag enum.
///
/// A closed set of categories; every file carries exactly one. Values read
/// back from storage metadata go through [`Subject::from_metadata`], which
/// coerces anything unrecognized to [`Subject::Unsorted`] instead of
/// letting stray strings become a tenth implicit category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    English,
    SocialScience,
    Science,
    Maths,
    Computer,
    Hindi,
    Sanskrit,
    Spanish,
    /// Fallback for files without a recognized subject tag.
    Unsorted,
}
impl Subject {
    /// Every subject, in display order.
    pub const ALL: [Subject; 9] = [
        Subject::English,
        Subject::SocialScience,
        Subject::Science,
        Subject::Maths,
        Subject::Computer,
        Subject::Hindi,
        Subject::Sanskrit,
        Subject::Spanish,
        Subject::Unsorted,
    ];

    /// Returns the canonical display string for the subject.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::English => "English",
            Subject::SocialScience => "Social Science",
            Subject::Science => "Science",
            Subject::Maths => "Maths",
            Subject::Computer => "Computer",
            Subject::Hindi => "Hindi",
            Subject::Sanskrit => "Sanskrit",
            Subject::Spanish => "Spanish",
            Subject::Unsorted => "Unsorted",
        }
    }

    /// Lenient conversion for values read back from storage metadata.
    ///
    /// Metadata written by other clients is outside this crate's control, so
    /// an absent or unrecognized value maps to [`Subject::Unsorted`].
    pub fn from_metadata(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or(Subject::Unsorted)
    }
}
impl TryFrom<String> for Subject {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}
impl FromStr for Subject {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = sanitize(s);
        Ok(match sanitized.as_str() {
            "english" => Self::English,
            "socialscience" => Self::SocialScience,
            "science" => Self::Science,
            "maths" | "math" | "mathematics" => Self::Maths,
            "computer" | "computers" => Self::Computer,
            "hindi" => Self::Hindi,
            "sanskrit" => Self::Sanskrit,
            "spanish" => Self::Spanish,
            "unsorted" => Self::Unsorted,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "subject",
                value: format!("unknown subject: {}", s)
            }),
        })
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Maths", Subject::Maths)]
    #[case("maths", Subject::Maths)]
    #[case("MATH", Subject::Maths)]
    #[case("Social Science", Subject::SocialScience)]
    #[case("social-science", Subject::SocialScience)]
    #[case("Unsorted", Subject::Unsorted)]
    fn test_parse_known_values(#[case] input: &str, #[case] expected: Subject) {
        assert_eq!(input.parse::<Subject>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_value() {
        let err = "Astrology".parse::<Subject>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "subject", .. }));
    }

    #[test]
    fn test_from_metadata_coerces_to_unsorted() {
        assert_eq!(Subject::from_metadata(Some("Maths")), Subject::Maths);
        assert_eq!(Subject::from_metadata(Some("Astrology")), Subject::Unsorted);
        assert_eq!(Subject::from_metadata(None), Subject::Unsorted);
    }

    #[test]
    fn test_display_round_trip() {
        for subject in Subject::ALL {
            assert_eq!(subject.as_str().parse::<Subject>().unwrap(), subject);
        }
    }
}
