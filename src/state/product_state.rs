/// Product state definitions for tracking detail-page progress
use std::fmt;

/// How far a stored listing has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductStatus {
    /// Listing link is known but its detail page was never fetched
    NotScraped,

    /// Detail page was fetched and parsed
    Scraped,

    /// Detail page redirected, returned 404, or had no listing heading
    Missing,

    /// Detail page fetch failed for another reason
    Failed,
}

impl ProductStatus {
    /// All statuses, in display order
    pub const ALL: [ProductStatus; 4] = [
        Self::NotScraped,
        Self::Scraped,
        Self::Missing,
        Self::Failed,
    ];

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NotScraped => "not_scraped",
            Self::Scraped => "scraped",
            Self::Missing => "missing",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "not_scraped" => Some(Self::NotScraped),
            "scraped" => Some(Self::Scraped),
            "missing" => Some(Self::Missing),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotScraped => "Not scraped",
            Self::Scraped => "Scraped",
            Self::Missing => "Missing",
            Self::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}
