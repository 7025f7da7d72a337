//! Paper model representing a research work found through one or more databases.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Publication;
use crate::utils::{clean_text, normalize_title};

/// How to reconcile two different publication dates for the same paper
/// (typically a preprint date against the final publication date).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateMergePolicy {
    /// Keep the earliest known date
    #[default]
    Earliest,
    /// Keep the latest known date
    Latest,
    /// Keep whichever date was seen first; later dates only fill a gap
    FirstSeen,
}

impl DateMergePolicy {
    /// Pick the date to keep
    pub fn resolve(self, current: Option<NaiveDate>, incoming: Option<NaiveDate>) -> Option<NaiveDate> {
        match (current, incoming) {
            (Some(a), Some(b)) => Some(match self {
                DateMergePolicy::Earliest => a.min(b),
                DateMergePolicy::Latest => a.max(b),
                DateMergePolicy::FirstSeen => a,
            }),
            (a, b) => a.or(b),
        }
    }
}

impl std::str::FromStr for DateMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "earliest" => Ok(DateMergePolicy::Earliest),
            "latest" => Ok(DateMergePolicy::Latest),
            "first-seen" | "first" => Ok(DateMergePolicy::FirstSeen),
            other => Err(format!("unknown date merge policy '{}'", other)),
        }
    }
}

/// A research paper aggregated from any supported database.
///
/// Identity for deduplication is the normalized title, not attribute equality;
/// see [`Paper::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Paper title
    pub title: String,

    /// Abstract text
    pub r#abstract: Option<String>,

    /// Author names
    pub authors: BTreeSet<String>,

    /// Venue the paper appeared in
    pub publication: Option<Publication>,

    /// Publication date
    pub publication_date: Option<NaiveDate>,

    /// Landing page and full-text URLs
    pub urls: BTreeSet<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Citation count reported by the source
    pub citations: Option<u32>,

    /// Author or index keywords
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub keywords: BTreeSet<String>,

    /// Labels of the databases that reported this paper
    pub databases: BTreeSet<String>,
}

impl Paper {
    /// Create a paper with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: clean_text(&title.into()),
            r#abstract: None,
            authors: BTreeSet::new(),
            publication: None,
            publication_date: None,
            urls: BTreeSet::new(),
            doi: None,
            citations: None,
            keywords: BTreeSet::new(),
            databases: BTreeSet::new(),
        }
    }

    /// Deduplication key; empty when the title is unusable
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }

    /// Whether the paper has a usable title
    pub fn has_title(&self) -> bool {
        !self.key().is_empty()
    }

    /// Returns the author names in sorted order
    pub fn author_list(&self) -> Vec<&str> {
        self.authors.iter().map(String::as_str).collect()
    }

    /// Record that `database` reported this paper
    pub fn add_database(&mut self, database: impl Into<String>) {
        self.databases.insert(database.into());
    }

    /// Add an author, ignoring blank names
    pub fn add_author(&mut self, author: &str) {
        let author = clean_text(author);
        if !author.is_empty() {
            self.authors.insert(author);
        }
    }

    /// Add a URL, ignoring blank values
    pub fn add_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.urls.insert(url.to_string());
        }
    }

    /// Replace the abstract when `candidate` is longer than the current one
    pub fn offer_abstract(&mut self, candidate: &str) {
        let candidate = clean_text(candidate);
        if candidate.is_empty() {
            return;
        }
        let current_len = self.r#abstract.as_ref().map_or(0, |a| a.chars().count());
        if candidate.chars().count() > current_len {
            self.r#abstract = Some(candidate);
        }
    }

    /// Fold another record of the same paper into this one.
    ///
    /// Set-valued fields are unioned, the longer abstract wins, dates follow
    /// `policy`, and publications are merged when they name the same venue.
    /// Callers are expected to have matched the two papers by [`Paper::key`].
    pub fn merge(&mut self, other: &Paper, policy: DateMergePolicy) {
        self.authors.extend(other.authors.iter().cloned());
        self.urls.extend(other.urls.iter().cloned());
        self.keywords.extend(other.keywords.iter().cloned());
        self.databases.extend(other.databases.iter().cloned());

        if let Some(abstract_text) = &other.r#abstract {
            self.offer_abstract(abstract_text);
        }

        self.publication_date = policy.resolve(self.publication_date, other.publication_date);

        if self.doi.is_none() {
            self.doi = other.doi.clone();
        }

        self.citations = match (self.citations, other.citations) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        match (&mut self.publication, &other.publication) {
            (Some(mine), Some(theirs)) => {
                if mine.is_same_venue(theirs) {
                    mine.merge(theirs);
                } else {
                    tracing::debug!(
                        "Keeping venue '{}' for '{}', ignoring '{}'",
                        mine.title,
                        self.title,
                        theirs.title
                    );
                }
            }
            (None, Some(theirs)) => self.publication = Some(theirs.clone()),
            _ => {}
        }
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with the required title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            paper: Paper::new(title),
        }
    }

    /// Add authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for author in authors {
            self.paper.add_author(author.as_ref());
        }
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl AsRef<str>) -> Self {
        self.paper.offer_abstract(abstract_text.as_ref());
        self
    }

    /// Set publication venue
    pub fn publication(mut self, publication: Publication) -> Self {
        self.paper.publication = Some(publication);
        self
    }

    /// Set publication date
    pub fn publication_date(mut self, date: NaiveDate) -> Self {
        self.paper.publication_date = Some(date);
        self
    }

    /// Add a URL
    pub fn url(mut self, url: impl AsRef<str>) -> Self {
        self.paper.add_url(url.as_ref());
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.trim().is_empty() {
            self.paper.doi = Some(doi.trim().to_string());
        }
        self
    }

    /// Set citation count
    pub fn citations(mut self, count: u32) -> Self {
        self.paper.citations = Some(count);
        self
    }

    /// Add keywords
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = clean_text(keyword.as_ref());
            if !keyword.is_empty() {
                self.paper.keywords.insert(keyword);
            }
        }
        self
    }

    /// Record the reporting database
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.paper.add_database(database);
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}
