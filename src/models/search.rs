//! Search parameters and the deduplicated result aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{DateMergePolicy, Paper, Publication};

/// User-supplied search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Boolean query string, e.g. `privacy AND "machine learning"`
    pub query: String,

    /// Only papers published on or after this date
    pub since: Option<NaiveDate>,

    /// Only papers published on or before this date
    pub until: Option<NaiveDate>,

    /// Subject areas to restrict the search to
    #[serde(default)]
    pub areas: BTreeSet<String>,

    /// Maximum number of distinct papers to collect
    pub limit: Option<usize>,

    /// Maximum number of papers contributed by any single database
    pub limit_per_database: Option<usize>,

    /// How conflicting publication dates are reconciled
    #[serde(default)]
    pub date_merge_policy: DateMergePolicy,
}

impl SearchParams {
    /// Create search parameters for a query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            since: None,
            until: None,
            areas: BTreeSet::new(),
            limit: None,
            limit_per_database: None,
            date_merge_policy: DateMergePolicy::default(),
        }
    }

    /// Set the since-date filter
    pub fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Set the until-date filter
    pub fn until(mut self, date: NaiveDate) -> Self {
        self.until = Some(date);
        self
    }

    /// Add a subject area
    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.areas.insert(area.into());
        self
    }

    /// Set the overall limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the per-database limit
    pub fn limit_per_database(mut self, limit: usize) -> Self {
        self.limit_per_database = Some(limit);
        self
    }

    /// Set the date merge policy
    pub fn date_merge_policy(mut self, policy: DateMergePolicy) -> Self {
        self.date_merge_policy = policy;
        self
    }

    /// Check the parameters before any network activity
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        if self.limit == Some(0) {
            return Err(SearchError::InvalidLimit("limit must be positive".to_string()));
        }
        if self.limit_per_database == Some(0) {
            return Err(SearchError::InvalidLimit(
                "limit per database must be positive".to_string(),
            ));
        }
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(SearchError::InvalidDateRange { since, until });
            }
        }
        Ok(())
    }
}

/// Fatal problems with search parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("Search query must not be empty")]
    InvalidQuery,

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid date range: {since} is after {until}")]
    InvalidDateRange { since: NaiveDate, until: NaiveDate },
}

/// What [`Search::add_paper`] did with a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored under a new key
    Inserted,
    /// Folded into the paper already stored under the same key
    Merged,
    /// New key refused because a limit was reached
    Rejected,
    /// No usable title
    Dropped,
}

/// The run-scoped, deduplicated collection of papers plus the parameters
/// that produced it.
///
/// Holds at most one paper per normalized title and at most one publication
/// per normalized venue title. Not synchronized: share it through a
/// [`SearchHandle`] when several searchers write concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct Search {
    #[serde(flatten)]
    params: SearchParams,

    #[serde(serialize_with = "serialize_papers")]
    papers: BTreeMap<String, Paper>,

    #[serde(skip)]
    publications: HashMap<String, Publication>,

    #[serde(skip)]
    database_counts: HashMap<String, usize>,
}

impl Search {
    /// Create an empty search, validating the parameters
    pub fn new(params: SearchParams) -> Result<Self, SearchError> {
        params.validate()?;
        Ok(Self {
            params,
            papers: BTreeMap::new(),
            publications: HashMap::new(),
            database_counts: HashMap::new(),
        })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn query(&self) -> &str {
        &self.params.query
    }

    /// Papers in key order
    pub fn papers(&self) -> impl Iterator<Item = &Paper> {
        self.papers.values()
    }

    /// Look up a paper by any title that normalizes to its key
    pub fn get_paper(&self, title: &str) -> Option<&Paper> {
        self.papers.get(&crate::utils::normalize_title(title))
    }

    /// Look up a canonical publication by venue title
    pub fn get_publication(&self, title: &str) -> Option<&Publication> {
        self.publications.get(&crate::utils::normalize_title(title))
    }

    /// Number of distinct papers
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    /// Number of stored papers reported by `database`
    pub fn database_count(&self, database: &str) -> usize {
        self.database_counts.get(database).copied().unwrap_or(0)
    }

    /// Whether no more new papers will be accepted, overall or from `database`
    pub fn reached_limit(&self, database: Option<&str>) -> bool {
        if let Some(limit) = self.params.limit {
            if self.papers.len() >= limit {
                return true;
            }
        }
        match (database, self.params.limit_per_database) {
            (Some(database), Some(limit)) => self.database_count(database) >= limit,
            _ => false,
        }
    }

    /// Add a paper, merging it into an existing one with the same normalized
    /// title.
    ///
    /// New keys are refused once a limit is reached; merges into existing
    /// papers are always applied so later sources can still enrich them.
    pub fn add_paper(&mut self, paper: Paper) -> AddOutcome {
        let key = paper.key();
        if key.is_empty() {
            return AddOutcome::Dropped;
        }

        let exists = self.papers.contains_key(&key);
        if !exists && self.rejects(&paper) {
            return AddOutcome::Rejected;
        }

        let venue = paper
            .publication
            .as_ref()
            .map(|publication| self.register_publication(publication));

        let outcome = match self.papers.get_mut(&key) {
            Some(existing) => {
                let known: BTreeSet<String> = existing.databases.clone();
                existing.merge(&paper, self.params.date_merge_policy);
                for database in existing.databases.difference(&known) {
                    *self.database_counts.entry(database.clone()).or_insert(0) += 1;
                }
                AddOutcome::Merged
            }
            None => {
                for database in &paper.databases {
                    *self.database_counts.entry(database.clone()).or_insert(0) += 1;
                }
                self.papers.insert(key.clone(), paper);
                AddOutcome::Inserted
            }
        };

        if let Some((venue_key, changed)) = venue {
            if changed {
                self.sync_publication(&venue_key, None);
            } else {
                self.sync_publication(&venue_key, Some(key.as_str()));
            }
        }

        outcome
    }

    fn rejects(&self, paper: &Paper) -> bool {
        if let Some(limit) = self.params.limit {
            if self.papers.len() >= limit {
                return true;
            }
        }
        if let Some(limit) = self.params.limit_per_database {
            return paper
                .databases
                .iter()
                .any(|database| self.database_count(database) >= limit);
        }
        false
    }

    /// Fold a venue into the canonical map; returns its key and whether the
    /// canonical record changed.
    fn register_publication(&mut self, publication: &Publication) -> (String, bool) {
        let key = publication.key();
        match self.publications.get_mut(&key) {
            Some(canonical) => {
                let changed = canonical.merge(publication);
                (key, changed)
            }
            None => {
                self.publications.insert(key.clone(), publication.clone());
                (key, true)
            }
        }
    }

    /// Copy the canonical venue onto papers that reference it: every such
    /// paper when `only` is `None`, otherwise just the paper under that key.
    fn sync_publication(&mut self, venue_key: &str, only: Option<&str>) {
        let Some(canonical) = self.publications.get(venue_key) else {
            return;
        };

        match only {
            Some(paper_key) => {
                if let Some(paper) = self.papers.get_mut(paper_key) {
                    adopt_publication(paper, venue_key, canonical);
                }
            }
            None => {
                for paper in self.papers.values_mut() {
                    adopt_publication(paper, venue_key, canonical);
                }
            }
        }
    }
}

fn adopt_publication(paper: &mut Paper, venue_key: &str, canonical: &Publication) {
    let references_venue = paper
        .publication
        .as_ref()
        .is_some_and(|publication| publication.key() == venue_key);
    if references_venue {
        paper.publication = Some(canonical.clone());
    }
}

fn serialize_papers<S>(papers: &BTreeMap<String, Paper>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(papers.values())
}

/// Mutex-guarded view of a [`Search`] shared by concurrently running
/// searchers. Every write is serialized through a single lock and the lock is
/// never held across an await point.
#[derive(Debug)]
pub struct SearchHandle<'a> {
    inner: Mutex<&'a mut Search>,
}

impl<'a> SearchHandle<'a> {
    pub fn new(search: &'a mut Search) -> Self {
        Self {
            inner: Mutex::new(search),
        }
    }

    /// Snapshot of the search parameters
    pub fn params(&self) -> SearchParams {
        self.lock().params.clone()
    }

    pub fn add_paper(&self, paper: Paper) -> AddOutcome {
        self.lock().add_paper(paper)
    }

    pub fn reached_limit(&self, database: Option<&str>) -> bool {
        self.lock().reached_limit(database)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, &'a mut Search> {
        // add_paper never leaves a key half-merged, so a poisoned lock is usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bibliometrics, PaperBuilder};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn search(limit: Option<usize>) -> Search {
        let mut params = SearchParams::new("this AND that")
            .since(date(1969, 1, 30))
            .area("humanities")
            .area("economics");
        params.limit = limit;
        Search::new(params).unwrap()
    }

    fn paper(title: &str) -> Paper {
        PaperBuilder::new(title)
            .authors(["Dr Paul"])
            .url(format!("https://example.com/{}", title.len()))
            .build()
    }

    #[test]
    fn test_create_search() {
        let search = search(Some(2));
        assert_eq!(search.query(), "this AND that");
        assert_eq!(search.params().since, Some(date(1969, 1, 30)));
        assert_eq!(search.params().areas.len(), 2);
        assert!(search.is_empty());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Search::new(SearchParams::new("  ")).unwrap_err(),
            SearchError::InvalidQuery
        );
        assert!(matches!(
            Search::new(SearchParams::new("q").limit(0)),
            Err(SearchError::InvalidLimit(_))
        ));
        assert!(matches!(
            Search::new(SearchParams::new("q").limit_per_database(0)),
            Err(SearchError::InvalidLimit(_))
        ));
        assert!(matches!(
            Search::new(SearchParams::new("q").since(date(2021, 1, 1)).until(date(2020, 1, 1))),
            Err(SearchError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_add_same_paper_twice_is_idempotent() {
        let mut search = search(None);
        let p = PaperBuilder::new("Awesome Paper Title")
            .authors(["Dr John", "Dr Paul"])
            .url("https://example.com/a")
            .build();

        assert_eq!(search.add_paper(p.clone()), AddOutcome::Inserted);
        assert_eq!(search.add_paper(p), AddOutcome::Merged);

        assert_eq!(search.len(), 1);
        let stored = search.get_paper("awesome paper title").unwrap();
        assert_eq!(stored.authors.len(), 2);
        assert_eq!(stored.urls.len(), 1);
    }

    #[test]
    fn test_titles_matched_after_normalization() {
        let mut search = search(None);
        search.add_paper(paper("Foo: A Study"));
        assert_eq!(search.add_paper(paper("foo a study")), AddOutcome::Merged);
        assert_eq!(search.add_paper(paper("Foobar")), AddOutcome::Inserted);
        assert_eq!(search.len(), 2);
    }

    #[test]
    fn test_untitled_paper_is_dropped() {
        let mut search = search(None);
        assert_eq!(search.add_paper(Paper::new("  ")), AddOutcome::Dropped);
        assert!(search.is_empty());
    }

    #[test]
    fn test_limit_rejects_new_keys_but_still_merges() {
        let mut search = search(Some(2));

        assert_eq!(search.add_paper(paper("first")), AddOutcome::Inserted);
        assert_eq!(search.add_paper(paper("second")), AddOutcome::Inserted);
        assert!(search.reached_limit(None));
        assert_eq!(search.add_paper(paper("third")), AddOutcome::Rejected);
        assert_eq!(search.len(), 2);

        let update = PaperBuilder::new("First")
            .authors(["Dr Ringo"])
            .url("https://example.com/new")
            .build();
        assert_eq!(search.add_paper(update), AddOutcome::Merged);

        let first = search.get_paper("first").unwrap();
        assert!(first.authors.contains("Dr Ringo"));
        assert!(first.urls.contains("https://example.com/new"));
    }

    #[test]
    fn test_limit_per_database() {
        let mut search = Search::new(SearchParams::new("q").limit_per_database(1)).unwrap();

        let scopus = |t: &str| PaperBuilder::new(t).database("Scopus").build();
        let acm = |t: &str| PaperBuilder::new(t).database("ACM").build();

        assert_eq!(search.add_paper(scopus("a")), AddOutcome::Inserted);
        assert!(search.reached_limit(Some("Scopus")));
        assert!(!search.reached_limit(Some("ACM")));
        assert_eq!(search.add_paper(scopus("b")), AddOutcome::Rejected);
        assert_eq!(search.add_paper(acm("b")), AddOutcome::Inserted);
        // merging "a" from ACM adds to ACM's count past its limit, which is allowed
        assert_eq!(search.add_paper(acm("a")), AddOutcome::Merged);
        assert_eq!(search.database_count("ACM"), 2);
        assert_eq!(search.database_count("Scopus"), 1);
    }

    #[test]
    fn test_publication_enrichment_reaches_earlier_papers() {
        let mut search = search(None);

        let bare = PaperBuilder::new("first")
            .publication(Publication::new("Journal of Things").unwrap())
            .build();
        let enriched = PaperBuilder::new("second")
            .publication(
                Publication::new("JOURNAL OF THINGS")
                    .unwrap()
                    .with_issn("1234-5678")
                    .with_bibliometrics(Bibliometrics::scopus(Some(3.5), Some(7.5), Some(1.0))),
            )
            .build();

        search.add_paper(bare);
        search.add_paper(enriched);

        let first = search.get_paper("first").unwrap();
        let publication = first.publication.as_ref().unwrap();
        assert_eq!(publication.title, "Journal of Things");
        assert_eq!(publication.issn.as_deref(), Some("1234-5678"));
        assert_eq!(
            publication.bibliometrics.as_ref().and_then(|b| b.cite_score()),
            Some(3.5)
        );
        assert_eq!(
            search.get_publication("journal of things").unwrap().issn.as_deref(),
            Some("1234-5678")
        );
    }

    #[test]
    fn test_new_paper_gets_canonical_publication() {
        let mut search = search(None);
        search.add_paper(
            PaperBuilder::new("first")
                .publication(Publication::new("Venue").unwrap().with_publisher("ACM"))
                .build(),
        );
        search.add_paper(
            PaperBuilder::new("second")
                .publication(Publication::new("venue").unwrap())
                .build(),
        );

        let second = search.get_paper("second").unwrap();
        assert_eq!(
            second.publication.as_ref().unwrap().publisher.as_deref(),
            Some("ACM")
        );
    }

    #[test]
    fn test_date_policy_applies_on_merge() {
        let params = SearchParams::new("q").date_merge_policy(DateMergePolicy::Latest);
        let mut search = Search::new(params).unwrap();

        search.add_paper(PaperBuilder::new("p").publication_date(date(2019, 1, 1)).build());
        search.add_paper(PaperBuilder::new("p").publication_date(date(2020, 1, 1)).build());

        assert_eq!(
            search.get_paper("p").unwrap().publication_date,
            Some(date(2020, 1, 1))
        );
    }

    #[test]
    fn test_handle_serializes_writes() {
        let mut search = search(Some(10));
        {
            let handle = SearchHandle::new(&mut search);
            assert_eq!(handle.add_paper(paper("one")), AddOutcome::Inserted);
            assert_eq!(handle.add_paper(paper("One")), AddOutcome::Merged);
            assert_eq!(handle.len(), 1);
            assert!(!handle.reached_limit(None));
            assert_eq!(handle.params().limit, Some(10));
        }
        assert_eq!(search.len(), 1);
    }

    #[test]
    fn test_serializes_papers_as_list() {
        let mut search = search(None);
        search.add_paper(paper("b"));
        search.add_paper(paper("a"));

        let json = serde_json::to_value(&search).unwrap();
        assert_eq!(json["query"], "this AND that");
        let papers = json["papers"].as_array().unwrap();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0]["title"], "a");
    }
}
