//! # findpapers
//!
//! Aggregates bibliographic search results from multiple academic databases
//! into a single deduplicated collection of papers, each enriched with
//! publication metadata and venue-level bibliometrics.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, Publication, Bibliometrics, Search)
//! - [`sources`]: Database backends behind the [`Backend`] trait, plus the
//!   paginating [`SourceSearcher`]
//! - [`runner`]: Runs one searcher per enabled backend against a shared search
//! - [`utils`]: Title normalization, HTTP client, retry helpers
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod runner;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{Bibliometrics, Paper, Publication, Search, SearchParams};
pub use runner::{run_search, RunOptions, RunReport};
pub use sources::{Backend, BackendRegistry, SourceSearcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
