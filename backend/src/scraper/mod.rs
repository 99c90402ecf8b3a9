//! Browser-driven site scraping
//!
//! A site adapter is anything that, given a query, yields candidate
//! `(title, absolute URL)` pairs and releases its resources when dropped.
//! The browser-backed [`GenericAdapter`] is the production implementation;
//! test fixtures provide canned candidate lists.

pub mod browser;
pub mod generic;
pub mod magnet;
pub mod site_config;

pub use generic::GenericAdapter;
pub use magnet::{BrowserMagnetExtractor, MagnetResolver};
pub use site_config::{ExtractionStep, SiteConfig, StepAction};

use std::time::Duration;

use async_trait::async_trait;

/// An unvetted search result harvested from a site's results page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub url: String,
}

/// Capability for searching one site
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Display name, used as the match's source site
    fn name(&self) -> &str;

    /// Run one search and enumerate candidates in page order
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, ScrapeError>;
}

/// Failure kinds for the scrape layer. Site-level errors are absorbed by the
/// worker; the remaining sites in a run proceed.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out waiting for {what} after {timeout:?}")]
    Timeout {
        what: &'static str,
        timeout: Duration,
    },

    #[error("search input not found")]
    SearchInputNotFound,

    #[error("could not submit search")]
    SubmitFailed,

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("extraction step {step} failed: {reason}")]
    ExtractionStep { step: usize, reason: String },
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(e.to_string())
    }
}
