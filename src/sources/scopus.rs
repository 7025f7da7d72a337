//! Scopus backend.
//!
//! Uses the Elsevier Scopus Search API for result pages and the Serial Title
//! API for venue metrics (CiteScore, SJR, SNIP). Paper landing pages on
//! scopus.com are scraped for abstracts, keywords and the full author list.
//! API documentation: https://dev.elsevier.com/sc_apis.html
//!
//! Requires an API key (`SCOPUS_API_KEY` or `[api_keys] scopus`).

use async_trait::async_trait;
use chrono::Datelike;
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Bibliometrics, Paper, Publication, SearchParams};
use crate::sources::{
    Backend, BackendCapabilities, PageCursor, ParseError, ParsedEntry, PublicationLookup,
    RawEntry, RawPage, SourceError, VenueDetails,
};
use crate::utils::{
    normalize_title, parse_date, select_texts, with_retry, HttpClient, RetryConfig,
};

const SCOPUS_API_BASE: &str = "https://api.elsevier.com";

/// Scopus subject area codes keyed by the lower-cased area names users pass
const SUBJECT_AREAS: &[(&str, &str)] = &[
    ("agricultural and biological sciences", "AGRI"),
    ("arts and humanities", "ARTS"),
    ("humanities", "ARTS"),
    ("biochemistry", "BIOC"),
    ("biology", "BIOC"),
    ("business", "BUSI"),
    ("chemical engineering", "CENG"),
    ("chemistry", "CHEM"),
    ("computer science", "COMP"),
    ("decision sciences", "DECI"),
    ("earth and planetary sciences", "EART"),
    ("economics", "ECON"),
    ("energy", "ENER"),
    ("engineering", "ENGI"),
    ("environmental science", "ENVI"),
    ("immunology and microbiology", "IMMU"),
    ("materials science", "MATE"),
    ("mathematics", "MATH"),
    ("medicine", "MEDI"),
    ("neuroscience", "NEUR"),
    ("nursing", "NURS"),
    ("pharmacology", "PHAR"),
    ("physics", "PHYS"),
    ("physics and astronomy", "PHYS"),
    ("psychology", "PSYC"),
    ("social sciences", "SOCI"),
    ("veterinary", "VETE"),
    ("dentistry", "DENT"),
    ("health professions", "HEAL"),
    ("multidisciplinary", "MULT"),
];

/// Scopus backend
#[derive(Debug, Clone)]
pub struct ScopusBackend {
    client: HttpClient,
    api_key: Option<String>,
    api_base: String,
    page_size: usize,
    retry: RetryConfig,
}

impl ScopusBackend {
    pub fn new(client: HttpClient, api_key: Option<String>, page_size: usize) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: SCOPUS_API_BASE.to_string(),
            page_size: page_size.clamp(1, 25),
            retry: RetryConfig::default(),
        }
    }

    /// Point the API requests at another host
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key.as_deref().ok_or_else(|| {
            SourceError::InvalidRequest(
                "Scopus API key not configured (set SCOPUS_API_KEY)".to_string(),
            )
        })
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, SourceError>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.api_key()?;
        let client = &self.client;

        with_retry(self.retry, || async move {
            let request = client
                .get(url)
                .await
                .header("X-ELS-APIKey", key)
                .header("Accept", "application/json");
            client.fetch_json::<T>(request).await
        })
        .await
    }

    async fn get_html(&self, url: &str) -> Result<String, SourceError> {
        let client = &self.client;

        with_retry(self.retry, || async move {
            let request = client.get(url).await.header("Accept", "text/html");
            client.fetch_text(request).await
        })
        .await
    }

    fn search_url(&self, query: &str, start: usize) -> String {
        format!(
            "{}/content/search/scopus?query={}&count={}&start={}",
            self.api_base,
            urlencoding::encode(query),
            self.page_size,
            start
        )
    }
}

/// Subject area code for a user-supplied area name
pub fn subject_area_code(area: &str) -> Option<&'static str> {
    let area = area.trim().to_lowercase();
    SUBJECT_AREAS
        .iter()
        .find(|(name, code)| *name == area || code.eq_ignore_ascii_case(&area))
        .map(|(_, code)| *code)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn link(links: &[ScopusLink], rel: &str) -> Option<String> {
    links
        .iter()
        .find(|link| link.rel == rel)
        .and_then(|link| non_empty(Some(link.href.clone())))
}

#[async_trait]
impl Backend for ScopusBackend {
    fn id(&self) -> &str {
        "scopus"
    }

    fn name(&self) -> &str {
        "Scopus"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::SEARCH
            | BackendCapabilities::BIBLIOMETRICS
            | BackendCapabilities::PAPER_DETAILS
    }

    fn translate_query(&self, params: &SearchParams) -> String {
        let mut query = format!("TITLE-ABS-KEY({})", params.query.trim());

        if let Some(since) = params.since {
            query.push_str(&format!(" AND PUBYEAR > {}", since.year() - 1));
        }
        if let Some(until) = params.until {
            query.push_str(&format!(" AND PUBYEAR < {}", until.year() + 1));
        }

        let mut codes: Vec<&str> = Vec::new();
        for area in &params.areas {
            match subject_area_code(area) {
                Some(code) if !codes.contains(&code) => codes.push(code),
                Some(_) => {}
                None => tracing::debug!("Scopus has no subject area for '{}'", area),
            }
        }
        if !codes.is_empty() {
            query.push_str(&format!(" AND SUBJAREA({})", codes.join(" OR ")));
        }

        query
    }

    async fn fetch_page(&self, query: &str, cursor: &PageCursor) -> Result<RawPage, SourceError> {
        let url = match cursor {
            PageCursor::Start => self.search_url(query, 0),
            PageCursor::Offset(start) => self.search_url(query, *start),
            PageCursor::Url(url) => url.clone(),
        };

        let response: ScopusSearchResponse = self.get_json(&url).await?;
        let results = response.search_results;

        let total = results
            .total_results
            .as_ref()
            .and_then(ScopusValue::number)
            .map(|t| t as usize);
        // an empty result set still carries one entry holding an error message
        let entries = if total == Some(0) {
            Vec::new()
        } else {
            results
                .entry
                .into_iter()
                .filter(|entry| entry.get("error").is_none())
                .map(RawEntry::Json)
                .collect()
        };

        Ok(RawPage {
            entries,
            next: link(&results.link, "next").map(PageCursor::Url),
            total_hint: total,
        })
    }

    fn parse_entry(&self, entry: &RawEntry) -> Result<ParsedEntry, ParseError> {
        let RawEntry::Json(value) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };
        let entry: ScopusEntry = serde_json::from_value(value.clone())
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let title = non_empty(entry.title).ok_or(ParseError::MissingTitle)?;

        let mut paper = Paper::new(title);
        if let Some(creator) = non_empty(entry.creator) {
            paper.add_author(&creator);
        }
        if let Some(description) = non_empty(entry.description) {
            paper.offer_abstract(&description);
        }
        if let Some(keywords) = entry.keywords {
            paper.keywords.extend(
                keywords
                    .split('|')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }
        paper.publication_date = entry.cover_date.as_deref().and_then(parse_date);
        paper.doi = non_empty(entry.doi);
        paper.citations = entry
            .cited_by_count
            .as_ref()
            .and_then(ScopusValue::number)
            .map(|c| c as u32);

        let details_url = link(&entry.link, "scopus");
        if let Some(url) = &details_url {
            paper.add_url(url);
        }

        let mut lookup = None;
        if let Some(mut publication) = non_empty(entry.publication_name).and_then(Publication::new) {
            publication.isbn = entry.isbn.as_ref().and_then(ScopusValue::text);
            publication.issn = non_empty(entry.issn).or_else(|| non_empty(entry.eissn));
            publication.category = non_empty(entry.aggregation_type);
            lookup = Some(PublicationLookup::new(
                publication.title.clone(),
                publication.issn.clone(),
            ));
            paper.publication = Some(publication);
        }

        Ok(ParsedEntry {
            paper,
            id: non_empty(entry.eid).or_else(|| non_empty(entry.identifier)),
            publication_lookup: lookup,
            details_url,
        })
    }

    async fn enrich_entry(&self, entry: &mut ParsedEntry) -> Result<(), SourceError> {
        let Some(url) = entry.details_url.clone() else {
            return Ok(());
        };
        let page = self.get_html(&url).await?;
        apply_paper_page(&mut entry.paper, &page);
        Ok(())
    }

    async fn fetch_publication(&self, lookup: &PublicationLookup) -> Result<RawEntry, SourceError> {
        let url = match &lookup.identifier {
            Some(issn) => format!(
                "{}/content/serial/title/issn/{}",
                self.api_base,
                urlencoding::encode(issn)
            ),
            None => format!(
                "{}/content/serial/title?title={}",
                self.api_base,
                urlencoding::encode(&lookup.title)
            ),
        };

        let response: SerialResponse = self.get_json(&url).await?;
        let entries = response.metadata.entry;

        // a title search may list several serials, keep the exact one
        let key = lookup.key();
        let found = if lookup.identifier.is_some() {
            entries.into_iter().next()
        } else {
            entries.into_iter().find(|entry| {
                serde_json::from_value::<SerialEntry>(entry.clone())
                    .ok()
                    .and_then(|serial| serial.title)
                    .is_some_and(|title| normalize_title(&title) == key)
            })
        };

        found
            .map(RawEntry::Json)
            .ok_or_else(|| SourceError::NotFound(format!("Scopus serial '{}'", lookup.title)))
    }

    fn parse_publication(&self, entry: &RawEntry) -> Result<VenueDetails, ParseError> {
        let RawEntry::Json(value) = entry else {
            return Err(ParseError::Unsupported(entry.kind()));
        };
        let serial: SerialEntry = serde_json::from_value(value.clone())
            .map_err(|e| ParseError::Malformed(e.to_string()))?;

        let cite_score = serial
            .cite_score_info
            .and_then(|info| info.current)
            .and_then(|metric| metric.number());
        let sjr = serial
            .sjr_list
            .and_then(|list| list.sjr)
            .and_then(|metric| metric.number());
        let snip = serial
            .snip_list
            .and_then(|list| list.snip)
            .and_then(|metric| metric.number());
        let bibliometrics = Bibliometrics::scopus(cite_score, sjr, snip);

        Ok(VenueDetails {
            publisher: non_empty(serial.publisher),
            subject_areas: serial
                .subject_areas
                .map(|areas| areas.texts().into_iter().collect())
                .unwrap_or_default(),
            bibliometrics: (!bibliometrics.is_empty()).then_some(bibliometrics),
        })
    }
}

/// Fill a paper from its scopus.com landing page.
///
/// The page's author list replaces the single first author the search API
/// reports; without one the API author is kept.
fn apply_paper_page(paper: &mut Paper, page: &str) {
    let document = Html::parse_document(page);
    let root = document.root_element();

    for paragraph in select_texts(root, "section#abstractSection p") {
        paper.offer_abstract(&paragraph);
    }
    paper
        .keywords
        .extend(select_texts(root, "span#authorKeywords span"));

    let authors = select_texts(root, "section#authorlist ul li span.previewTxt");
    if !authors.is_empty() {
        paper.authors.clear();
        for author in &authors {
            paper.add_author(author);
        }
    }
}

// ===== Scopus API Types =====

/// A value Scopus sends as a string, a number, a `{"$": ...}` wrapper or a
/// list of those
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScopusValue {
    Text(String),
    Number(f64),
    Tagged {
        #[serde(rename = "$", default)]
        value: Option<Box<ScopusValue>>,
    },
    List(Vec<ScopusValue>),
}

impl ScopusValue {
    /// Every non-empty text, flattening lists and wrappers
    fn texts(&self) -> Vec<String> {
        match self {
            Self::Text(s) => non_empty(Some(s.clone())).into_iter().collect(),
            Self::Number(n) => vec![n.to_string()],
            Self::Tagged { value } => value.as_deref().map(Self::texts).unwrap_or_default(),
            Self::List(items) => items.iter().flat_map(Self::texts).collect(),
        }
    }

    fn text(&self) -> Option<String> {
        self.texts().into_iter().next()
    }

    fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            other => other.text()?.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScopusLink {
    #[serde(rename = "@ref", default)]
    rel: String,
    #[serde(rename = "@href", default)]
    href: String,
}

#[derive(Debug, Deserialize)]
struct ScopusSearchResponse {
    #[serde(rename = "search-results")]
    search_results: ScopusSearchResults,
}

#[derive(Debug, Deserialize)]
struct ScopusSearchResults {
    #[serde(rename = "opensearch:totalResults")]
    total_results: Option<ScopusValue>,
    #[serde(default)]
    link: Vec<ScopusLink>,
    #[serde(default)]
    entry: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "dc:description")]
    description: Option<String>,
    #[serde(rename = "authkeywords")]
    keywords: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "citedby-count")]
    cited_by_count: Option<ScopusValue>,
    #[serde(default)]
    link: Vec<ScopusLink>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:isbn")]
    isbn: Option<ScopusValue>,
    #[serde(rename = "prism:issn")]
    issn: Option<String>,
    #[serde(rename = "prism:eIssn")]
    eissn: Option<String>,
    #[serde(rename = "prism:aggregationType")]
    aggregation_type: Option<String>,
    eid: Option<String>,
    #[serde(rename = "dc:identifier")]
    identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerialResponse {
    #[serde(rename = "serial-metadata-response", default)]
    metadata: SerialResults,
}

#[derive(Debug, Default, Deserialize)]
struct SerialResults {
    #[serde(default)]
    entry: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SerialEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:publisher")]
    publisher: Option<String>,
    #[serde(rename = "subject-area")]
    subject_areas: Option<ScopusValue>,
    #[serde(rename = "citeScoreYearInfoList")]
    cite_score_info: Option<CiteScoreInfo>,
    #[serde(rename = "SJRList")]
    sjr_list: Option<SjrList>,
    #[serde(rename = "SNIPList")]
    snip_list: Option<SnipList>,
}

#[derive(Debug, Deserialize)]
struct CiteScoreInfo {
    #[serde(rename = "citeScoreCurrentMetric")]
    current: Option<ScopusValue>,
}

#[derive(Debug, Deserialize)]
struct SjrList {
    #[serde(rename = "SJR")]
    sjr: Option<ScopusValue>,
}

#[derive(Debug, Deserialize)]
struct SnipList {
    #[serde(rename = "SNIP")]
    snip: Option<ScopusValue>,
}
