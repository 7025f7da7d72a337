//! Utility modules supporting the search pipeline.
//!
//! - [`normalize_title`]: Canonical key used to deduplicate papers and publications
//! - [`parse_date`]: Lenient parsing of the date formats databases report
//! - [`HttpClient`]: HTTP client with built-in rate limiting
//! - [`with_retry`]: Execute a request with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use findpapers::sources::SourceError;
//! use findpapers::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_page() -> Result<String, SourceError> { Ok("page".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let page = with_retry(config, || fetch_page()).await?;
//! # Ok(())
//! # }
//! ```

mod date;
mod html;
mod http;
mod retry;
mod title;

pub use date::parse_date;
pub use html::{select_attr, select_text, select_texts};
pub use http::{status_error, HttpClient};
pub use retry::{with_retry, RetryConfig, TransientError};
pub use title::{clean_text, normalize_title};
