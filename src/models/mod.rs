//! Core data models for papers, publications and searches.

mod bibliometrics;
mod paper;
mod publication;
mod search;

pub use bibliometrics::Bibliometrics;
pub use paper::{DateMergePolicy, Paper, PaperBuilder};
pub use publication::Publication;
pub use search::{AddOutcome, Search, SearchError, SearchHandle, SearchParams};
