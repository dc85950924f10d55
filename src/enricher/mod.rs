//! Best-effort page title enrichment.
//!
//! Titles are looked up in a process-wide [`TitleCache`] first and fetched
//! over HTTP only on a miss. A failed lookup never blocks delivery of the hit.

pub mod cache;
pub mod title;

use thiserror::Error;

pub use cache::TitleCache;
pub use title::{TitleEnricher, extract_title};

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("No title found in response from {url}")]
    NotFound { url: String },

    #[error("Title fetch for {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Title fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Title cache I/O error on {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
