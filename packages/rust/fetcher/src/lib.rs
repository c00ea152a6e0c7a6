//! Source page retrieval for the by-URL flow.
//!
//! This crate provides:
//! - [`SourceFetcher`] — the fetch seam used by the pipeline
//! - [`HttpSourceFetcher`] — reqwest-backed implementation with SSRF protection
//! - [`extract`] — title/description/main-text extraction over `scraper`

pub mod engine;
pub mod extract;

use async_trait::async_trait;

use blogmate_shared::{Result, SourcePage};

pub use engine::HttpSourceFetcher;
pub use extract::{MAX_CONTENT_CHARS, extract_page};

/// Retrieves a web page and extracts its readable text.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url`. Transport failures and non-success statuses are
    /// [`BlogMateError::Fetch`](blogmate_shared::BlogMateError::Fetch);
    /// a page without a main-content container yields empty `content`.
    async fn fetch(&self, url: &str) -> Result<SourcePage>;
}
