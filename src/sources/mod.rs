//! Database backends with a trait-based architecture.
//!
//! Every bibliographic database implements the [`Backend`] trait: it turns
//! the search parameters into its own query language, fetches result pages,
//! parses raw entries into [`Paper`]s and optionally looks up venue-level
//! information. The generic [`SourceSearcher`] drives any backend through the
//! same paging loop, so new databases only describe *what* they fetch.
//!
//! # Runtime Source Configuration
//!
//! Backends are selected through the `[sources]` configuration section or the
//! matching environment variables:
//!
//! - `FINDPAPERS_SOURCES__ENABLED_SOURCES` - Only use these backends (e.g. "scopus")
//! - `FINDPAPERS_SOURCES__DISABLED_SOURCES` - Never use these backends (e.g. "acm")
//!
//! ## Priority Rules
//!
//! 1. If `enabled_sources` is set, only those backends are used
//! 2. `disabled_sources` always takes precedence

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::models::{Bibliometrics, Paper, Publication, SearchParams};
use crate::utils::normalize_title;

pub mod acm;
pub mod mock;
mod registry;
mod report;
pub mod scopus;
mod searcher;

pub use registry::{BackendCapabilities, BackendRegistry};
pub use report::{SearchIssue, SourceReport, StopReason};
pub use searcher::{SearcherOptions, SourceSearcher, DEFAULT_MAX_PAGES};

/// Position of the next page to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page of the result set
    Start,
    /// Zero-based page or record offset, meaning is up to the backend
    Offset(usize),
    /// Absolute URL of the next page as announced by the database
    Url(String),
}

/// One unparsed result entry as delivered by a database
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    /// JSON record (REST APIs)
    Json(serde_json::Value),
    /// HTML fragment (scraped result lists)
    Html(String),
}

/// One fetched result page
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    /// Entries in database order
    pub entries: Vec<RawEntry>,
    /// Cursor of the following page, `None` when this is the last one
    pub next: Option<PageCursor>,
    /// Total number of results the database reports for the query
    pub total_hint: Option<usize>,
}

impl RawPage {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            next: None,
            total_hint: None,
        }
    }

    pub fn with_next(mut self, next: PageCursor) -> Self {
        self.next = Some(next);
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total_hint = Some(total);
        self
    }
}

/// What a backend needs to fetch venue details for a publication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicationLookup {
    /// Venue title as reported on the entry
    pub title: String,
    /// Backend-specific identifier (ISSN, venue page URL, ...)
    pub identifier: Option<String>,
}

impl PublicationLookup {
    pub fn new(title: impl Into<String>, identifier: Option<String>) -> Self {
        Self {
            title: title.into(),
            identifier,
        }
    }

    /// Cache key, venues are identified by normalized title
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// A parsed entry before it is handed to the search
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    /// The paper as far as the result page describes it
    pub paper: Paper,
    /// Database identifier used in diagnostics
    pub id: Option<String>,
    /// Present when the backend can fetch venue details for this entry
    pub publication_lookup: Option<PublicationLookup>,
    /// Landing page carrying details missing from the result list
    pub details_url: Option<String>,
}

impl ParsedEntry {
    pub fn new(paper: Paper) -> Self {
        Self {
            paper,
            id: None,
            publication_lookup: None,
            details_url: None,
        }
    }

    /// Identifier for diagnostics, falling back to the title
    pub fn label(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.paper.title.clone())
    }
}

/// Venue-level details fetched from a database
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VenueDetails {
    pub publisher: Option<String>,
    pub subject_areas: BTreeSet<String>,
    pub bibliometrics: Option<Bibliometrics>,
}

impl VenueDetails {
    /// Fill the publication with whatever it is missing
    pub fn apply_to(&self, publication: &mut Publication) {
        if publication.publisher.is_none() {
            publication.publisher = self.publisher.clone();
        }
        publication
            .subject_areas
            .extend(self.subject_areas.iter().cloned());
        if let Some(bibliometrics) = &self.bibliometrics {
            publication.add_bibliometrics(bibliometrics);
        }
    }
}

/// Failure to turn one raw entry into a paper.
///
/// Parse failures are recorded and skipped, they never abort a search.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The entry has no usable title
    #[error("entry has no title")]
    MissingTitle,

    /// The entry is not in the shape the backend expects
    #[error("malformed entry: {0}")]
    Malformed(String),

    /// The backend cannot parse this kind of entry
    #[error("unsupported {0} entry")]
    Unsupported(&'static str),
}

/// A bibliographic database that can be searched page by page
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Stable identifier used for configuration (e.g. "scopus")
    fn id(&self) -> &str;

    /// Database label recorded on papers (e.g. "Scopus")
    fn name(&self) -> &str;

    /// What this backend supports beyond plain search
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::SEARCH
    }

    /// Translate the search parameters into this database's query
    fn translate_query(&self, params: &SearchParams) -> String;

    /// Fetch one result page
    async fn fetch_page(&self, query: &str, cursor: &PageCursor) -> Result<RawPage, SourceError>;

    /// Parse one raw entry into a paper
    fn parse_entry(&self, entry: &RawEntry) -> Result<ParsedEntry, ParseError>;

    /// Complete an entry from its landing page
    async fn enrich_entry(&self, _entry: &mut ParsedEntry) -> Result<(), SourceError> {
        Ok(())
    }

    /// Fetch the raw venue record for a publication
    async fn fetch_publication(&self, _lookup: &PublicationLookup) -> Result<RawEntry, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Parse a venue record fetched by [`Backend::fetch_publication`]
    fn parse_publication(&self, entry: &RawEntry) -> Result<VenueDetails, ParseError> {
        Err(ParseError::Unsupported(entry.kind()))
    }
}

impl RawEntry {
    /// Short name of the entry format
    pub fn kind(&self) -> &'static str {
        match self {
            RawEntry::Json(_) => "json",
            RawEntry::Html(_) => "html",
        }
    }
}

/// Errors that can occur when talking to a database
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this backend
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters or missing credentials
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the database
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("request timed out: {}", err))
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_key_is_normalized() {
        let lookup = PublicationLookup::new("  ACM  Computing Surveys ", None);
        assert_eq!(lookup.key(), "acm computing surveys");
    }

    #[test]
    fn test_venue_details_fill_gaps() {
        let mut publication = Publication::new("Journal of Things")
            .unwrap()
            .with_publisher("Original Press");
        let details = VenueDetails {
            publisher: Some("Other Press".to_string()),
            subject_areas: ["Computer Science".to_string()].into_iter().collect(),
            bibliometrics: Some(Bibliometrics::scopus(Some(3.5), Some(7.5), Some(1.0))),
        };

        details.apply_to(&mut publication);
        assert_eq!(publication.publisher.as_deref(), Some("Original Press"));
        assert!(publication.subject_areas.contains("Computer Science"));
        assert_eq!(
            publication.bibliometrics.and_then(|b| b.sjr()),
            Some(7.5)
        );
    }

    #[test]
    fn test_entry_label_prefers_id() {
        let mut entry = ParsedEntry::new(Paper::new("A title"));
        assert_eq!(entry.label(), "A title");
        entry.id = Some("2-s2.0-1".to_string());
        assert_eq!(entry.label(), "2-s2.0-1");
    }

    #[test]
    fn test_source_error_display() {
        assert_eq!(SourceError::RateLimit.to_string(), "Rate limit exceeded");
        assert_eq!(
            SourceError::Network("boom".into()).to_string(),
            "Network error: boom"
        );
        assert_eq!(ParseError::MissingTitle.to_string(), "entry has no title");
    }
}
