//! Data models for messages, classifications and location buckets
//!
//! This module contains the in-memory shapes shared by the stores and the
//! pipeline stages. On-disk row shapes live next to the stores.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Classification state of a message.
///
/// The location only exists on a report, so a comment or an unclassified
/// message can never carry one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "classification", rename_all = "lowercase")]
pub enum Classification {
    /// Not yet processed by the classifier
    #[default]
    Unset,
    /// Firsthand account of an observed flood at a location
    Report {
        /// Location as extracted by the classifier, never empty
        location: String,
    },
    /// Anything that is not a locatable eyewitness report
    Comment,
}

impl Classification {
    /// Label written to the classification column; empty when unset.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Report { .. } => "report",
            Self::Comment => "comment",
        }
    }

    /// Location of a report, empty otherwise.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Report { location } => location,
            Self::Unset | Self::Comment => "",
        }
    }

    /// True until the classifier has labelled the message.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// A single ingested social-media post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the poster, kept as text
    pub author_id: String,
    /// Body with each line break replaced by a space
    pub text: String,
    /// Creation time exactly as supplied by the source
    pub posted_at: String,
    /// Classification state
    #[serde(flatten)]
    pub classification: Classification,
}

impl Message {
    /// Create an unclassified message.
    pub fn new(author_id: impl Into<String>, text: impl Into<String>, posted_at: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            text: text.into(),
            posted_at: posted_at.into(),
            classification: Classification::Unset,
        }
    }

    /// Deduplication key of this message
    #[must_use]
    pub fn key(&self) -> DedupKey {
        DedupKey {
            author_id: self.author_id.clone(),
            text: self.text.clone(),
            posted_at: self.posted_at.clone(),
        }
    }

    /// Location of the message, empty unless it is a report
    #[must_use]
    pub fn location(&self) -> &str {
        self.classification.location()
    }

    /// Day this message counts towards in the location aggregate
    #[must_use]
    pub fn date_key(&self) -> String {
        date_key(&self.posted_at)
    }
}

/// Identity of a message: two messages with the same author, text and
/// timestamp are the same message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    /// Poster identity
    pub author_id: String,
    /// Normalized body
    pub text: String,
    /// Raw source timestamp
    pub posted_at: String,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.author_id, self.posted_at)
    }
}

/// Aggregate count of reports for one location on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReportBucket {
    /// Location text as extracted by the classifier
    pub location: String,
    /// `YYYY-MM-DD`, or the raw timestamp when it could not be parsed
    pub date: String,
    /// Number of reports seen for this key, always positive
    pub report_count: u64,
}

/// Result of parsing one classifier reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// Eyewitness report at a non-empty location
    Report {
        /// Trimmed location text
        location: String,
    },
    /// Not a report
    Comment,
}

impl ParsedReply {
    /// Classification to store for this reply
    #[must_use]
    pub fn into_classification(self) -> Classification {
        match self {
            Self::Report { location } => Classification::Report { location },
            Self::Comment => Classification::Comment,
        }
    }
}

/// Output format for table listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma-separated values format
    Csv,
    /// Plain text format
    Txt,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other} (expected txt, csv or json)")),
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
];

/// Date-only layouts, month first for slashed dates
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Calendar day of a source timestamp, as `YYYY-MM-DD`.
///
/// RFC 3339 timestamps use the date in their own offset. Values that do not
/// parse fall back to the trimmed raw string so the report is still counted,
/// under a bucket of its own.
#[must_use]
pub fn date_key(posted_at: &str) -> String {
    let raw = posted_at.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return dt.date().format("%Y-%m-%d").to_string();
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    warn!(posted_at = raw, "Unparseable timestamp, using it verbatim as date key");
    raw.to_string()
}
