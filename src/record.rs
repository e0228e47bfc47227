// src/record.rs
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::SourceError;

/// Sentinel written when a source has no URL for an item.
pub const URL_NOT_AVAILABLE: &str = "N/A";

/// The normalized unit of output. Built by a source's `normalize`, checked
/// once by [`validate`], never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub content: String,
    pub source: String, // e.g. "newsapi", "csv", "web"
    pub url: String,    // real URL or "N/A"
    #[serde(serialize_with = "iso8601_utc")]
    pub fetched_at: DateTime<Utc>,
}

impl Record {
    /// Stamps `fetched_at` with the current time.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
            url: url.unwrap_or_default(),
            fetched_at: Utc::now(),
        }
    }

    /// Field equality ignoring `fetched_at`.
    pub fn same_payload(&self, other: &Record) -> bool {
        self.title == other.title
            && self.content == other.content
            && self.source == other.source
            && self.url == other.url
    }
}

fn iso8601_utc<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Source-agnostic gate every candidate passes before it enters the output.
///
/// Rejects blank `title`, `content` or `source` as item-level `Malformed`;
/// a blank `url` becomes [`URL_NOT_AVAILABLE`].
pub fn validate(mut candidate: Record) -> Result<Record, SourceError> {
    if candidate.title.trim().is_empty() {
        return Err(SourceError::malformed_item("record title is empty"));
    }
    if candidate.content.trim().is_empty() {
        return Err(SourceError::malformed_item("record content is empty"));
    }
    if candidate.source.trim().is_empty() {
        return Err(SourceError::malformed_item("record source is empty"));
    }
    if candidate.url.trim().is_empty() {
        candidate.url = URL_NOT_AVAILABLE.to_string();
    }
    Ok(candidate)
}
