//! Publication (venue) model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Bibliometrics;
use crate::utils::normalize_title;

/// A publication venue: journal, conference proceedings, book series.
///
/// Two publications are the same venue when their normalized titles match.
/// ISBN and ISSN are kept as supplementary hints and filled in by later
/// entries that carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Venue title
    pub title: String,

    /// International Standard Book Number
    pub isbn: Option<String>,

    /// International Standard Serial Number (print or electronic)
    pub issn: Option<String>,

    /// Publisher name
    pub publisher: Option<String>,

    /// Venue type as reported by the source (Journal, Conference Proceeding, ...)
    pub category: Option<String>,

    /// Subject areas reported for the venue
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub subject_areas: BTreeSet<String>,

    /// Venue-level indicators, merged across sources
    pub bibliometrics: Option<Bibliometrics>,
}

impl Publication {
    /// Create a publication with only a title.
    ///
    /// Returns `None` when the title has no usable characters.
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = crate::utils::clean_text(&title.into());
        if normalize_title(&title).is_empty() {
            return None;
        }

        Some(Self {
            title,
            isbn: None,
            issn: None,
            publisher: None,
            category: None,
            subject_areas: BTreeSet::new(),
            bibliometrics: None,
        })
    }

    /// Deduplication key
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }

    /// Whether `other` names the same venue
    pub fn is_same_venue(&self, other: &Publication) -> bool {
        self.key() == other.key()
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = non_empty(isbn.into());
        self
    }

    pub fn with_issn(mut self, issn: impl Into<String>) -> Self {
        self.issn = non_empty(issn.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = non_empty(publisher.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_empty(category.into());
        self
    }

    pub fn with_bibliometrics(mut self, bibliometrics: Bibliometrics) -> Self {
        self.add_bibliometrics(&bibliometrics);
        self
    }

    /// Fold another source's indicators into this publication
    pub fn add_bibliometrics(&mut self, bibliometrics: &Bibliometrics) {
        if bibliometrics.is_empty() {
            return;
        }
        self.bibliometrics = Some(match &self.bibliometrics {
            Some(existing) => existing.merged_with(bibliometrics),
            None => bibliometrics.clone(),
        });
    }

    /// Fill fields missing here from another record of the same venue.
    ///
    /// Returns true if anything changed. Callers are expected to check
    /// [`Publication::is_same_venue`] first.
    pub fn merge(&mut self, other: &Publication) -> bool {
        let before = self.clone();

        fill(&mut self.isbn, &other.isbn);
        fill(&mut self.issn, &other.issn);
        fill(&mut self.publisher, &other.publisher);
        fill(&mut self.category, &other.category);
        self.subject_areas.extend(other.subject_areas.iter().cloned());
        if let Some(bibliometrics) = &other.bibliometrics {
            self.add_bibliometrics(bibliometrics);
        }

        *self != before
    }
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        if let Some(value) = source {
            *target = Some(value.clone());
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publication() -> Publication {
        Publication::new("awesome publication title")
            .unwrap()
            .with_isbn("isbn-X")
            .with_issn("issn-X")
            .with_publisher("that publisher")
            .with_category("Journal")
    }

    #[test]
    fn test_create_publication() {
        let publication = publication();
        assert_eq!(publication.title, "awesome publication title");
        assert_eq!(publication.isbn.as_deref(), Some("isbn-X"));
        assert_eq!(publication.issn.as_deref(), Some("issn-X"));
        assert_eq!(publication.publisher.as_deref(), Some("that publisher"));
        assert_eq!(publication.category.as_deref(), Some("Journal"));
        assert!(publication.bibliometrics.is_none());
    }

    #[test]
    fn test_title_required() {
        assert!(Publication::new("").is_none());
        assert!(Publication::new("  ...  ").is_none());
    }

    #[test]
    fn test_same_venue_ignores_case_and_spacing() {
        let a = Publication::new("IEEE  Transactions on Software Engineering").unwrap();
        let b = Publication::new("ieee transactions on software engineering").unwrap();
        assert!(a.is_same_venue(&b));
    }

    #[test]
    fn test_merge_fills_missing_fields_only() {
        let mut bare = Publication::new("Awesome Publication Title").unwrap();
        let full = publication().with_bibliometrics(Bibliometrics::acm(Some(2.2), Some(4.7)));

        assert!(bare.merge(&full));
        assert_eq!(bare.title, "Awesome Publication Title");
        assert_eq!(bare.isbn.as_deref(), Some("isbn-X"));
        assert_eq!(bare.publisher.as_deref(), Some("that publisher"));
        assert_eq!(
            bare.bibliometrics.as_ref().and_then(|b| b.avg_downloads_per_article()),
            Some(4.7)
        );

        let other = Publication::new("awesome publication title")
            .unwrap()
            .with_publisher("someone else");
        assert!(!bare.merge(&other));
        assert_eq!(bare.publisher.as_deref(), Some("that publisher"));
    }

    #[test]
    fn test_bibliometrics_from_two_sources() {
        let mut publication = publication();
        publication.add_bibliometrics(&Bibliometrics::scopus(Some(3.5), Some(7.5), Some(1.0)));
        publication.add_bibliometrics(&Bibliometrics::acm(Some(2.2), Some(4.7)));

        let bibliometrics = publication.bibliometrics.unwrap();
        assert_eq!(bibliometrics.cite_score(), Some(3.5));
        assert_eq!(bibliometrics.avg_citations_per_article(), Some(2.2));
    }

    #[test]
    fn test_empty_bibliometrics_are_ignored() {
        let mut publication = publication();
        publication.add_bibliometrics(&Bibliometrics::default());
        assert!(publication.bibliometrics.is_none());
    }
}
