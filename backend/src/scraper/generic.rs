//! Generic selector-driven site adapter
//!
//! Drives one search against a configured site: load the landing page, fill
//! the search input, submit, then enumerate candidate links from the
//! rendered results. Detail pages are never visited here; magnet extraction
//! is deferred until a match is confirmed, since the per-item cap is small
//! and the filter funnel rejects most candidates.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::browser::{capture_page, settle, wait_for_element, BrowserSession};
use super::site_config::{
    SiteConfig, DEFAULT_SEARCH_BUTTON_SELECTOR, SEARCH_BUTTON_TEXT,
};
use super::{Candidate, ScrapeError, SiteAdapter};

const NAV_TIMEOUT: Duration = Duration::from_secs(30);
const INPUT_TIMEOUT: Duration = Duration::from_secs(10);
const BUTTON_TIMEOUT: Duration = Duration::from_secs(5);
const SUBMIT_SETTLE_DELAY: Duration = Duration::from_secs(2);
const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);

/// Candidate titles shorter than this are navigation noise
const MIN_TITLE_LEN: usize = 10;

/// Link texts that are never candidates, compared case-insensitively
const NAV_LINK_TEXT: &[&str] = &[
    "home",
    "login",
    "register",
    "about",
    "contact",
    "privacy",
    "terms",
    "terms of service",
    "dmca",
];

/// Browser-backed adapter configured per site
pub struct GenericAdapter {
    base_url: String,
    display_name: String,
    config: SiteConfig,
    debug_dir: Option<PathBuf>,
}

impl GenericAdapter {
    pub fn new(
        base_url: String,
        display_name: String,
        config: SiteConfig,
        debug_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            base_url,
            display_name,
            config,
            debug_dir,
        }
    }

    async fn run_search(
        &self,
        session: &BrowserSession,
        query: &str,
    ) -> Result<Vec<Candidate>, ScrapeError> {
        info!(site = %self.display_name, query = %query, "Searching site");

        let page = session.open(&self.base_url, NAV_TIMEOUT).await?;

        let input = wait_for_element(&page, self.config.search_input_selector(), INPUT_TIMEOUT)
            .await
            .map_err(|_| ScrapeError::SearchInputNotFound)?;

        input.click().await?;
        input.type_str(query).await?;

        self.submit(&page, &input).await?;
        settle(&page, SUBMIT_SETTLE_DELAY, RESULTS_TIMEOUT).await;

        if let Some(dir) = &self.debug_dir {
            capture_page(&page, dir, &self.base_url).await;
        }

        let html = page.content().await?;
        let candidates = enumerate_candidates(&html, &self.base_url, self.config.link_selector())?;

        info!(
            site = %self.display_name,
            count = candidates.len(),
            "Enumerated candidates from results page"
        );
        Ok(candidates)
    }

    /// Submit the search: click the button when one can be located within
    /// its wait budget, otherwise press Enter on the input.
    async fn submit(&self, page: &Page, input: &Element) -> Result<(), ScrapeError> {
        if let Some(button) = self.find_submit_button(page).await {
            if button.click().await.is_ok() {
                return Ok(());
            }
            debug!(site = %self.display_name, "Submit click failed, pressing Enter");
        }

        input
            .press_key("Enter")
            .await
            .map_err(|_| ScrapeError::SubmitFailed)?;
        Ok(())
    }

    async fn find_submit_button(&self, page: &Page) -> Option<Element> {
        if let Some(selector) = self.config.search_button_selector() {
            return wait_for_element(page, selector, BUTTON_TIMEOUT).await.ok();
        }

        if let Ok(element) =
            wait_for_element(page, DEFAULT_SEARCH_BUTTON_SELECTOR, BUTTON_TIMEOUT).await
        {
            return Some(element);
        }

        // Text matching is not expressible in CSS, so scan buttons directly.
        if let Ok(buttons) = page.find_elements("button").await {
            for button in buttons {
                if let Ok(Some(text)) = button.inner_text().await {
                    if text.contains(SEARCH_BUTTON_TEXT) {
                        return Some(button);
                    }
                }
            }
        }

        None
    }
}

#[async_trait]
impl SiteAdapter for GenericAdapter {
    fn name(&self) -> &str {
        &self.display_name
    }

    async fn search(&self, query: &str) -> Result<Vec<Candidate>, ScrapeError> {
        let session = BrowserSession::launch().await?;
        let result = self.run_search(&session, query).await;
        session.close().await;
        result
    }
}

/// Harvest candidate links from a rendered results page.
///
/// Rules: an href is required, visible text must be at least
/// [`MIN_TITLE_LEN`] characters and not boilerplate, relative hrefs resolve
/// against the site base, URLs are re-parsed to normalize encoding, and
/// duplicates (by resolved URL) keep their first occurrence.
pub fn enumerate_candidates(
    html: &str,
    base_url: &str,
    link_selector: &str,
) -> Result<Vec<Candidate>, ScrapeError> {
    let selector = Selector::parse(link_selector)
        .map_err(|e| ScrapeError::Selector(format!("{}: {}", link_selector, e)))?;

    let base = Url::parse(base_url).map_err(|e| ScrapeError::Navigation {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    let document = Html::parse_document(html);
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };

        let text = element
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if text.chars().count() < MIN_TITLE_LEN {
            continue;
        }

        let lower = text.to_lowercase();
        if NAV_LINK_TEXT.contains(&lower.as_str()) || lower.starts_with("page ") {
            continue;
        }

        // Absolute http(s) hrefs pass through; root-relative ones resolve
        // against the base. Anything else (fragments, javascript:) is noise.
        let resolved = if href.starts_with("http") {
            Url::parse(href)
        } else if href.starts_with('/') {
            base.join(href)
        } else {
            continue;
        };

        let url = match resolved {
            Ok(u) => u.to_string(),
            Err(e) => {
                debug!(href = %href, error = %e, "Skipping malformed candidate URL");
                continue;
            }
        };

        if !seen.insert(url.clone()) {
            continue;
        }

        candidates.push(Candidate { title: text, url });
    }

    Ok(candidates)
}
