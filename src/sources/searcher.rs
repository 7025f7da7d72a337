//! Generic paging loop shared by all backends.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

use super::{
    Backend, BackendCapabilities, ParsedEntry, PageCursor, PublicationLookup, RawEntry,
    SearchIssue, SourceReport, StopReason, VenueDetails,
};
use crate::models::{AddOutcome, SearchHandle};

/// Default number of pages fetched before a source is stopped
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Bounds applied to one source's run
#[derive(Debug, Clone)]
pub struct SearcherOptions {
    /// Pages fetched before the safety bound stops the source
    pub max_pages: usize,
    /// Point in time after which no further page is requested
    pub deadline: Option<Instant>,
    /// Whether to fetch landing pages of backends that support it
    pub fetch_details: bool,
}

impl Default for SearcherOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            deadline: None,
            fetch_details: true,
        }
    }
}

/// Drives one backend through its result pages and feeds the search.
///
/// Venue lookups are cached per run by normalized venue title; failures
/// are cached too so a broken venue is requested only once.
#[derive(Debug)]
pub struct SourceSearcher {
    backend: Arc<dyn Backend>,
    options: SearcherOptions,
    venues: HashMap<String, Option<VenueDetails>>,
}

impl SourceSearcher {
    pub fn new(backend: Arc<dyn Backend>, options: SearcherOptions) -> Self {
        Self {
            backend,
            options,
            venues: HashMap::new(),
        }
    }

    /// Run the paging loop until the source is exhausted or a bound is hit.
    ///
    /// Never fails: transport errors stop this source only and end up in
    /// the returned report together with any skipped entries.
    pub async fn run(&mut self, search: &SearchHandle<'_>) -> SourceReport {
        self.venues.clear();

        let database = self.backend.name().to_string();
        let mut report = SourceReport::new(database.clone());
        let query = self.backend.translate_query(&search.params());
        tracing::info!(source = %database, query = %query, "Searching");

        let mut cursor = PageCursor::Start;
        let mut consumed = 0usize;

        loop {
            if self.out_of_time() {
                tracing::info!(source = %database, "Time budget exhausted");
                report.stop_reason = StopReason::BudgetExhausted;
                break;
            }
            if search.reached_limit(Some(&database)) {
                report.stop_reason = StopReason::LimitReached;
                break;
            }
            if report.pages >= self.options.max_pages {
                report.record(SearchIssue::SafetyBound {
                    pages: report.pages,
                });
                report.stop_reason = StopReason::SafetyBound;
                break;
            }

            let page = match self.backend.fetch_page(&query, &cursor).await {
                Ok(page) => page,
                Err(e) => {
                    report.record(SearchIssue::Transport {
                        page: report.pages + 1,
                        reason: e.to_string(),
                    });
                    report.stop_reason = StopReason::TransportFailed;
                    break;
                }
            };
            report.pages += 1;
            tracing::debug!(
                source = %database,
                page = report.pages,
                entries = page.entries.len(),
                "Fetched page"
            );

            let total = page.total_hint;
            for entry in &page.entries {
                if total.is_some_and(|total| consumed >= total) {
                    break;
                }
                if search.reached_limit(Some(&database)) {
                    break;
                }
                consumed += 1;
                report.entries += 1;
                self.process_entry(entry, &database, search, &mut report).await;
            }

            if search.reached_limit(Some(&database)) {
                report.stop_reason = StopReason::LimitReached;
                break;
            }
            match page.next {
                Some(next) if total.map_or(true, |total| consumed < total) => cursor = next,
                _ => {
                    report.stop_reason = StopReason::Exhausted;
                    break;
                }
            }
        }

        tracing::info!(
            source = %database,
            pages = report.pages,
            inserted = report.inserted,
            merged = report.merged,
            stop = ?report.stop_reason,
            "Source finished"
        );
        report
    }

    async fn process_entry(
        &mut self,
        raw: &RawEntry,
        database: &str,
        search: &SearchHandle<'_>,
        report: &mut SourceReport,
    ) {
        let mut entry = match self.backend.parse_entry(raw) {
            Ok(entry) if entry.paper.has_title() => entry,
            Ok(entry) => {
                skip(report, entry.label(), super::ParseError::MissingTitle.to_string());
                return;
            }
            Err(e) => {
                let position = format!("#{}", report.entries);
                skip(report, position, e.to_string());
                return;
            }
        };
        entry.paper.add_database(database);

        let capabilities = self.backend.capabilities();
        if self.options.fetch_details
            && capabilities.contains(BackendCapabilities::PAPER_DETAILS)
            && entry.details_url.is_some()
        {
            if let Err(e) = self.backend.enrich_entry(&mut entry).await {
                report.record(SearchIssue::Enrichment {
                    target: entry.label(),
                    reason: e.to_string(),
                });
            }
        }

        if capabilities.contains(BackendCapabilities::BIBLIOMETRICS) {
            self.attach_venue_details(&mut entry, report).await;
        }

        match search.add_paper(entry.paper) {
            AddOutcome::Inserted => report.inserted += 1,
            AddOutcome::Merged => report.merged += 1,
            AddOutcome::Rejected => report.rejected += 1,
            AddOutcome::Dropped => report.skipped += 1,
        }
    }

    async fn attach_venue_details(&mut self, entry: &mut ParsedEntry, report: &mut SourceReport) {
        let Some(lookup) = entry.publication_lookup.clone() else {
            return;
        };
        let Some(publication) = entry.paper.publication.as_mut() else {
            return;
        };
        if let Some(details) = self.venue_details(&lookup, report).await {
            details.apply_to(publication);
        }
    }

    async fn venue_details(
        &mut self,
        lookup: &PublicationLookup,
        report: &mut SourceReport,
    ) -> Option<VenueDetails> {
        let key = lookup.key();
        if key.is_empty() {
            return None;
        }
        if let Some(cached) = self.venues.get(&key) {
            return cached.clone();
        }

        report.venue_lookups += 1;
        let result = match self.backend.fetch_publication(lookup).await {
            Ok(raw) => self
                .backend
                .parse_publication(&raw)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let details = match result {
            Ok(details) => Some(details),
            Err(reason) => {
                report.record(SearchIssue::Enrichment {
                    target: lookup.title.clone(),
                    reason,
                });
                None
            }
        };
        self.venues.insert(key, details.clone());
        details
    }

    fn out_of_time(&self) -> bool {
        self.options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn skip(report: &mut SourceReport, entry: String, reason: String) {
    report.skipped += 1;
    report.record(SearchIssue::Parse { entry, reason });
}
