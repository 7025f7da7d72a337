//! Mock backend for testing purposes.
//!
//! Serves scripted pages of JSON entries in a small, flat schema:
//!
//! ```json
//! {"title": "...", "abstract": "...", "authors": ["..."], "date": "2020-03-15",
//!  "url": "...", "doi": "...", "citations": 3, "keywords": ["..."],
//!  "venue": {"title": "...", "issn": "...", "isbn": "...", "publisher": "...", "category": "..."}}
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Bibliometrics, Paper, Publication, SearchParams};
use crate::sources::{
    Backend, BackendCapabilities, PageCursor, ParseError, ParsedEntry, PublicationLookup,
    RawEntry, RawPage, SourceError, VenueDetails,
};
use crate::utils::{normalize_title, parse_date};

/// A backend that replays scripted pages.
///
/// Pages are served in order; when a scripted page does not name a next
/// cursor, the following scripted page is linked automatically. An endless
/// backend keeps announcing a next page and repeats its last one.
#[derive(Debug)]
pub struct MockBackend {
    id: String,
    name: String,
    pages: Vec<Result<RawPage, SourceError>>,
    endless: bool,
    delay: Option<Duration>,
    venues: HashMap<String, Value>,
    page_calls: Arc<AtomicUsize>,
    venue_calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a mock backend; `name` is the database label put on papers
    pub fn new(name: &str) -> Self {
        Self {
            id: name.to_lowercase(),
            name: name.to_string(),
            pages: Vec::new(),
            endless: false,
            delay: None,
            venues: HashMap::new(),
            page_calls: Arc::new(AtomicUsize::new(0)),
            venue_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append a page
    pub fn with_page(mut self, page: RawPage) -> Self {
        self.pages.push(Ok(page));
        self
    }

    /// Append a page built from entries with the given titles
    pub fn with_titles<I, S>(self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = titles.into_iter().map(|t| mock_entry(t.as_ref())).collect();
        self.with_page(RawPage::new(entries))
    }

    /// Append a page request that fails
    pub fn with_failure(mut self, error: SourceError) -> Self {
        self.pages.push(Err(error));
        self
    }

    /// Always announce another page, repeating the last scripted one
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Sleep before serving each page
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register venue details served for a venue title
    pub fn with_venue(mut self, title: &str, details: Value) -> Self {
        self.venues.insert(normalize_title(title), details);
        self
    }

    /// Counter of page requests, shared with the backend
    pub fn page_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.page_calls)
    }

    /// Counter of venue lookups, shared with the backend
    pub fn venue_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.venue_calls)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::SEARCH | BackendCapabilities::BIBLIOMETRICS
    }

    fn translate_query(&self, params: &SearchParams) -> String {
        params.query.clone()
    }

    async fn fetch_page(&self, _query: &str, cursor: &PageCursor) -> Result<RawPage, SourceError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let index = match cursor {
            PageCursor::Start => 0,
            PageCursor::Offset(index) => *index,
            PageCursor::Url(url) => {
                return Err(SourceError::InvalidRequest(format!("unexpected cursor {}", url)))
            }
        };

        let scripted = if self.endless {
            self.pages.get(index).or_else(|| self.pages.last())
        } else {
            self.pages.get(index)
        };
        let mut page = match scripted {
            Some(Ok(page)) => page.clone(),
            Some(Err(e)) => return Err(e.clone()),
            None => return Ok(RawPage::default()),
        };

        if page.next.is_none() && (self.endless || index + 1 < self.pages.len()) {
            page.next = Some(PageCursor::Offset(index + 1));
        }
        Ok(page)
    }

    fn parse_entry(&self, entry: &RawEntry) -> Result<ParsedEntry, ParseError> {
        let RawEntry::Json(value) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };
        let title = value["title"].as_str().ok_or(ParseError::MissingTitle)?;

        let mut paper = Paper::new(title);
        if let Some(text) = value["abstract"].as_str() {
            paper.offer_abstract(text);
        }
        for author in strings(&value["authors"]) {
            paper.add_author(author);
        }
        paper.keywords.extend(strings(&value["keywords"]).map(str::to_string));
        if let Some(url) = value["url"].as_str() {
            paper.add_url(url);
        }
        paper.doi = value["doi"].as_str().map(str::to_string);
        paper.citations = value["citations"].as_u64().map(|c| c as u32);
        paper.publication_date = value["date"].as_str().and_then(parse_date);

        let mut entry_lookup = None;
        if let Some(venue_title) = value["venue"]["title"].as_str() {
            let venue = &value["venue"];
            if let Some(mut publication) = Publication::new(venue_title) {
                publication.isbn = venue["isbn"].as_str().map(str::to_string);
                publication.issn = venue["issn"].as_str().map(str::to_string);
                publication.publisher = venue["publisher"].as_str().map(str::to_string);
                publication.category = venue["category"].as_str().map(str::to_string);
                entry_lookup = Some(PublicationLookup::new(
                    publication.title.clone(),
                    publication.issn.clone(),
                ));
                paper.publication = Some(publication);
            }
        }

        Ok(ParsedEntry {
            paper,
            id: value["id"].as_str().map(str::to_string),
            publication_lookup: entry_lookup,
            details_url: None,
        })
    }

    async fn fetch_publication(&self, lookup: &PublicationLookup) -> Result<RawEntry, SourceError> {
        self.venue_calls.fetch_add(1, Ordering::SeqCst);
        self.venues
            .get(&lookup.key())
            .cloned()
            .map(RawEntry::Json)
            .ok_or_else(|| SourceError::NotFound(lookup.title.clone()))
    }

    fn parse_publication(&self, entry: &RawEntry) -> Result<VenueDetails, ParseError> {
        let RawEntry::Json(value) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };

        let mut bibliometrics = Bibliometrics::scopus(
            value["cite_score"].as_f64(),
            value["sjr"].as_f64(),
            value["snip"].as_f64(),
        )
        .merged_with(&Bibliometrics::acm(
            value["avg_citations"].as_f64(),
            value["avg_downloads"].as_f64(),
        ));
        if let Some(h_index) = value["h_index"].as_f64() {
            bibliometrics = bibliometrics.with_h_index(h_index);
        }

        Ok(VenueDetails {
            publisher: value["publisher"].as_str().map(str::to_string),
            subject_areas: strings(&value["subject_areas"]).map(str::to_string).collect(),
            bibliometrics: (!bibliometrics.is_empty()).then_some(bibliometrics),
        })
    }
}

fn strings(value: &Value) -> impl Iterator<Item = &str> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Helper function to create a mock entry with only a title
pub fn mock_entry(title: &str) -> RawEntry {
    RawEntry::Json(json!({ "title": title }))
}
