//! Runs one search across several backends.

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::SearchConfig;
use crate::models::{Search, SearchHandle};
use crate::sources::{
    Backend, SearchIssue, SearcherOptions, SourceReport, SourceSearcher, DEFAULT_MAX_PAGES,
};

/// Options for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Pages fetched per source before its safety bound is hit
    pub max_pages: usize,
    /// Wall-clock budget for the whole run
    pub time_budget: Option<Duration>,
    /// Search all sources at the same time instead of one after another
    pub concurrent: bool,
    /// Fetch paper landing pages where a backend supports it
    pub fetch_details: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            time_budget: None,
            concurrent: true,
            fetch_details: true,
        }
    }
}

impl From<&SearchConfig> for RunOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            time_budget: config.time_budget_secs.map(Duration::from_secs),
            concurrent: config.concurrent,
            fetch_details: config.fetch_paper_details,
        }
    }
}

/// Outcome of a run, one report per backend in the order given
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// All issues, paired with the source that reported them
    pub fn issues(&self) -> impl Iterator<Item = (&str, &SearchIssue)> {
        self.sources.iter().flat_map(|report| {
            report
                .issues
                .iter()
                .map(move |issue| (report.source.as_str(), issue))
        })
    }

    /// Report of the backend with the given database label
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.source == name)
    }

    pub fn total_inserted(&self) -> usize {
        self.sources.iter().map(|report| report.inserted).sum()
    }

    pub fn has_issues(&self) -> bool {
        self.sources.iter().any(|report| !report.is_clean())
    }
}

/// Search every backend and collect the results into `search`.
///
/// Never fails: each backend's problems stay in its own report and what
/// was collected before a failure, a limit or the time budget is kept.
pub async fn run_search(
    search: &mut Search,
    backends: &[Arc<dyn Backend>],
    options: &RunOptions,
) -> RunReport {
    // a budget too large to represent is no budget at all
    let deadline = options
        .time_budget
        .and_then(|budget| Instant::now().checked_add(budget));
    let searcher_options = SearcherOptions {
        max_pages: options.max_pages,
        deadline,
        fetch_details: options.fetch_details,
    };

    tracing::info!(
        query = %search.query(),
        sources = backends.len(),
        concurrent = options.concurrent,
        "Starting search run"
    );

    let handle = SearchHandle::new(search);
    let mut searchers: Vec<SourceSearcher> = backends
        .iter()
        .map(|backend| SourceSearcher::new(Arc::clone(backend), searcher_options.clone()))
        .collect();

    let sources = if options.concurrent {
        join_all(searchers.iter_mut().map(|searcher| searcher.run(&handle))).await
    } else {
        let mut reports = Vec::with_capacity(searchers.len());
        for searcher in &mut searchers {
            reports.push(searcher.run(&handle).await);
        }
        reports
    };

    let report = RunReport { sources };
    tracing::info!(
        papers = handle.len(),
        issues = report.issues().count(),
        "Search run finished"
    );
    report
}
