// src/ingest/types.rs
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the news source, e.g. `2025-03-14T09:30:00Z`.
pub const PUBLISHED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A validated article, ready to be fingerprinted and delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// Wire shape of one article. Every field is optional so a single bad item
/// never fails deserialization of the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<RawSource>,
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Why a candidate was left out of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingUrl,
    MissingSource,
    MissingPublishedAt,
    BadTimestamp(String),
    StoreUnavailable(String),
}

impl SkipReason {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::MissingTitle => "missing_title",
            SkipReason::MissingUrl => "missing_url",
            SkipReason::MissingSource => "missing_source",
            SkipReason::MissingPublishedAt => "missing_published_at",
            SkipReason::BadTimestamp(_) => "bad_timestamp",
            SkipReason::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BadTimestamp(raw) => write!(f, "bad timestamp {raw:?}"),
            SkipReason::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            other => f.write_str(other.label()),
        }
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse the source's fixed timestamp layout as UTC.
pub fn parse_published_at(raw: &str) -> Result<DateTime<Utc>, SkipReason> {
    NaiveDateTime::parse_from_str(raw.trim(), PUBLISHED_AT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| SkipReason::BadTimestamp(raw.to_string()))
}

impl RawArticle {
    pub fn parse(&self) -> Result<Article, SkipReason> {
        // Title and url feed the fingerprint, so they are kept verbatim.
        let title = self
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(SkipReason::MissingTitle)?;
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(SkipReason::MissingUrl)?;
        let source_name = non_empty(self.source.as_ref().and_then(|s| s.name.as_deref()))
            .ok_or(SkipReason::MissingSource)?;
        let raw_ts = non_empty(self.published_at.as_deref()).ok_or(SkipReason::MissingPublishedAt)?;
        let published_at = parse_published_at(raw_ts)?;

        Ok(Article {
            title: title.to_string(),
            url: url.to_string(),
            source_name: source_name.to_string(),
            published_at,
        })
    }
}

/// NewsAPI `sortBy` value. Configured as `publishedAt`, `relevancy` or `popularity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    PublishedAt,
    Relevancy,
    Popularity,
}

impl SortOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::PublishedAt => "publishedAt",
            SortOrder::Relevancy => "relevancy",
            SortOrder::Popularity => "popularity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub query: String,
    pub language: String,
    pub sort: SortOrder,
    pub page_size: usize,
}

/// Result of one fetch. `Degraded` means the source could not be read this
/// cycle; it is not the same thing as "no news".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Vec<RawArticle>),
    Degraded { reason: String },
}

impl FetchOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded { .. })
    }
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch at most `query.page_size` candidates, most recent first.
    /// Never fails: errors are logged and reported as `FetchOutcome::Degraded`.
    async fn fetch_candidates(&self, query: &FetchQuery) -> FetchOutcome;
    fn name(&self) -> &'static str;
}
