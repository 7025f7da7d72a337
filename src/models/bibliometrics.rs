//! Venue-level impact indicators.

use serde::{Deserialize, Serialize};

/// Normalized bibliometric indicators for a publication venue.
///
/// Each database reports its own subset: Scopus provides CiteScore, SJR and
/// SNIP, the ACM Digital Library provides per-article citation and download
/// averages. Values are immutable; combining indicators from two sources
/// produces a new value via [`Bibliometrics::merged_with`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bibliometrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    cite_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sjr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snip: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_citations_per_article: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_downloads_per_article: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    h_index: Option<f64>,
}

impl Bibliometrics {
    /// Indicators reported by Scopus serial metadata
    pub fn scopus(cite_score: Option<f64>, sjr: Option<f64>, snip: Option<f64>) -> Self {
        Self {
            cite_score,
            sjr,
            snip,
            ..Default::default()
        }
    }

    /// Indicators reported by an ACM venue page
    pub fn acm(avg_citations_per_article: Option<f64>, avg_downloads_per_article: Option<f64>) -> Self {
        Self {
            avg_citations_per_article,
            avg_downloads_per_article,
            ..Default::default()
        }
    }

    /// Builder-style h-index setter
    pub fn with_h_index(mut self, h_index: f64) -> Self {
        self.h_index = Some(h_index);
        self
    }

    /// Scopus CiteScore
    pub fn cite_score(&self) -> Option<f64> {
        self.cite_score
    }

    /// SCImago Journal Rank
    pub fn sjr(&self) -> Option<f64> {
        self.sjr
    }

    /// Source Normalized Impact per Paper
    pub fn snip(&self) -> Option<f64> {
        self.snip
    }

    /// ACM average citations per article
    pub fn avg_citations_per_article(&self) -> Option<f64> {
        self.avg_citations_per_article
    }

    /// ACM average downloads per article
    pub fn avg_downloads_per_article(&self) -> Option<f64> {
        self.avg_downloads_per_article
    }

    /// Venue h-index
    pub fn h_index(&self) -> Option<f64> {
        self.h_index
    }

    /// True when no indicator is set
    pub fn is_empty(&self) -> bool {
        self.cite_score.is_none()
            && self.sjr.is_none()
            && self.snip.is_none()
            && self.avg_citations_per_article.is_none()
            && self.avg_downloads_per_article.is_none()
            && self.h_index.is_none()
    }

    /// Combine with indicators from another source.
    ///
    /// Fields already present on `self` win; missing ones are taken from `other`.
    pub fn merged_with(&self, other: &Bibliometrics) -> Bibliometrics {
        Bibliometrics {
            cite_score: self.cite_score.or(other.cite_score),
            sjr: self.sjr.or(other.sjr),
            snip: self.snip.or(other.snip),
            avg_citations_per_article: self
                .avg_citations_per_article
                .or(other.avg_citations_per_article),
            avg_downloads_per_article: self
                .avg_downloads_per_article
                .or(other.avg_downloads_per_article),
            h_index: self.h_index.or(other.h_index),
        }
    }
}
