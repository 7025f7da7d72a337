//! Per-source outcome of a search run.

use serde::Serialize;

/// A non-fatal problem met while searching one database
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchIssue {
    /// An entry could not be parsed and was skipped
    Parse { entry: String, reason: String },
    /// A page could not be fetched; the source stopped there
    Transport { page: usize, reason: String },
    /// Paper details or venue details could not be fetched
    Enrichment { target: String, reason: String },
    /// The page safety bound was hit before the results ran out
    SafetyBound { pages: usize },
}

impl std::fmt::Display for SearchIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchIssue::Parse { entry, reason } => write!(f, "skipped entry {}: {}", entry, reason),
            SearchIssue::Transport { page, reason } => {
                write!(f, "failed to fetch page {}: {}", page, reason)
            }
            SearchIssue::Enrichment { target, reason } => {
                write!(f, "could not enrich {}: {}", target, reason)
            }
            SearchIssue::SafetyBound { pages } => {
                write!(f, "stopped after {} pages, results may be incomplete", pages)
            }
        }
    }
}

/// Why a source stopped paging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The database has no further pages, or its reported total was consumed
    Exhausted,
    /// The overall or per-database limit was reached
    LimitReached,
    /// The time budget ran out
    BudgetExhausted,
    /// The maximum number of pages was fetched
    SafetyBound,
    /// A page request failed
    TransportFailed,
}

/// Counters and issues for one database in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub pages: usize,
    pub entries: usize,
    pub inserted: usize,
    pub merged: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub venue_lookups: usize,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<SearchIssue>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pages: 0,
            entries: 0,
            inserted: 0,
            merged: 0,
            rejected: 0,
            skipped: 0,
            venue_lookups: 0,
            stop_reason: StopReason::Exhausted,
            issues: Vec::new(),
        }
    }

    /// Record an issue and log it
    pub fn record(&mut self, issue: SearchIssue) {
        tracing::warn!(source = %self.source, "{}", issue);
        self.issues.push(issue);
    }

    /// Whether the source finished without any issue
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_issue() {
        let mut report = SourceReport::new("ACM");
        assert!(report.is_clean());

        report.record(SearchIssue::Transport {
            page: 2,
            reason: "connection reset".to_string(),
        });
        assert!(!report.is_clean());
        assert_eq!(
            report.issues[0].to_string(),
            "failed to fetch page 2: connection reset"
        );
    }

    #[test]
    fn test_issue_serialization_is_tagged() {
        let json = serde_json::to_value(SearchIssue::SafetyBound { pages: 100 }).unwrap();
        assert_eq!(json["kind"], "safety_bound");
        assert_eq!(json["pages"], 100);

        let json = serde_json::to_value(StopReason::BudgetExhausted).unwrap();
        assert_eq!(json, "budget_exhausted");
    }
}
