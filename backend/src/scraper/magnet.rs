//! Detail-page magnet extraction for confirmed matches
//!
//! Resolution runs in order and the first non-empty result wins: a direct
//! magnet anchor, a gateway link carrying a URL-encoded magnet in its path,
//! then any anchor with a decodable magnet fragment. A missing magnet is a
//! non-fatal outcome; the match is persisted with an empty magnet field.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::Page;
use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::browser::{capture_page, settle, wait_for_element, BrowserSession};
use super::site_config::{ExtractionStep, SiteConfig, StepAction};
use super::ScrapeError;

const NAV_TIMEOUT: Duration = Duration::from_secs(10);
const STEP_TIMEOUT: Duration = Duration::from_secs(10);
const STEP_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Anchor texts that identify a magnet link when the href itself is not one
const MAGNET_LINK_TEXTS: &[&str] = &["Magnet Link", "Magnet Download"];

/// Capability for turning a detail-page URL into a magnet URI
#[async_trait]
pub trait MagnetResolver: Send + Sync {
    /// Returns `Ok(None)` when the page holds no recognizable magnet
    async fn resolve(
        &self,
        detail_url: &str,
        config: Option<&SiteConfig>,
    ) -> Result<Option<String>, ScrapeError>;
}

/// Browser-backed magnet extractor
pub struct BrowserMagnetExtractor {
    debug_dir: Option<PathBuf>,
}

impl BrowserMagnetExtractor {
    pub fn new(debug_dir: Option<PathBuf>) -> Self {
        Self { debug_dir }
    }

    async fn resolve_inner(
        &self,
        session: &BrowserSession,
        url: &str,
        config: Option<&SiteConfig>,
    ) -> Result<Option<String>, ScrapeError> {
        let page = session.open(url, NAV_TIMEOUT).await?;

        if let Some(dir) = &self.debug_dir {
            capture_page(&page, dir, url).await;
        }

        // Config-driven extraction steps take precedence when the site
        // defines them; the generic strategies remain the fallback.
        let steps = config.map(|c| c.extraction_steps.as_slice()).unwrap_or(&[]);
        if !steps.is_empty() {
            match run_extraction_steps(session, page.clone(), steps).await {
                Ok(Some(value)) => {
                    if let Some(magnet) = magnet_from_href(&value) {
                        info!(url = %url, "Extracted magnet via configured steps");
                        return Ok(Some(magnet));
                    }
                    warn!(url = %url, value = %value, "Extraction steps yielded a non-magnet value");
                }
                Ok(None) => {
                    warn!(url = %url, "Extraction steps finished without an extract action");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Extraction steps failed, falling back");
                }
            }
        }

        let html = page.content().await?;
        Ok(find_magnet_in_html(&html))
    }
}

#[async_trait]
impl MagnetResolver for BrowserMagnetExtractor {
    async fn resolve(
        &self,
        detail_url: &str,
        config: Option<&SiteConfig>,
    ) -> Result<Option<String>, ScrapeError> {
        // Re-parse to normalize encoding; detail URLs can carry non-ASCII.
        let encoded = Url::parse(detail_url)
            .map_err(|e| ScrapeError::Navigation {
                url: detail_url.to_string(),
                reason: e.to_string(),
            })?
            .to_string();

        debug!(url = %encoded, "Navigating to detail page");

        let session = BrowserSession::launch().await?;
        let result = self.resolve_inner(&session, &encoded, config).await;
        session.close().await;
        result
    }
}

/// Walk the configured steps on the open page, returning the extracted value
async fn run_extraction_steps(
    session: &BrowserSession,
    mut page: Page,
    steps: &[ExtractionStep],
) -> Result<Option<String>, ScrapeError> {
    for (i, step) in steps.iter().enumerate() {
        debug!(step = i, action = ?step.action, selector = %step.selector, "Running extraction step");

        match step.action {
            StepAction::Click => {
                let element = wait_for_element(&page, &step.selector, STEP_TIMEOUT)
                    .await
                    .map_err(|e| step_error(i, e))?;
                element.click().await.map_err(|e| step_error(i, e))?;
                settle(&page, STEP_SETTLE_DELAY, STEP_TIMEOUT).await;
            }

            StepAction::ClickNewPage => {
                let element = wait_for_element(&page, &step.selector, STEP_TIMEOUT)
                    .await
                    .map_err(|e| step_error(i, e))?;
                element.click().await.map_err(|e| step_error(i, e))?;
                tokio::time::sleep(STEP_SETTLE_DELAY).await;

                if let Some(newest) = session.newest_page().await? {
                    page = newest;
                }
                settle(&page, Duration::ZERO, STEP_TIMEOUT).await;
            }

            StepAction::Extract => {
                let element = wait_for_element(&page, &step.selector, STEP_TIMEOUT)
                    .await
                    .map_err(|e| step_error(i, e))?;

                let value = if step.attribute == "text" {
                    element.inner_text().await.map_err(|e| step_error(i, e))?
                } else {
                    element
                        .attribute(&step.attribute)
                        .await
                        .map_err(|e| step_error(i, e))?
                };

                return match value.filter(|v| !v.is_empty()) {
                    Some(v) => Ok(Some(v)),
                    None => Err(ScrapeError::ExtractionStep {
                        step: i,
                        reason: format!("empty {}", step.attribute),
                    }),
                };
            }
        }
    }

    Ok(None)
}

fn step_error(step: usize, e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::ExtractionStep {
        step,
        reason: e.to_string(),
    }
}

/// Locate a magnet URI in a rendered detail page.
pub fn find_magnet_in_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a").expect("static selector");

    // 1. Direct: the first anchor that either has a magnet href or is
    //    labelled as a magnet link, accepted only with a magnet href.
    let direct = document.select(&anchors).find(|a| {
        let href = a.value().attr("href").unwrap_or("");
        if href.starts_with("magnet:") {
            return true;
        }
        let text = a.text().collect::<String>();
        MAGNET_LINK_TEXTS.iter().any(|t| text.contains(t))
    });
    if let Some(a) = direct {
        let href = a.value().attr("href").unwrap_or("");
        if href.starts_with("magnet:") {
            return Some(href.to_string());
        }
    }

    // 2. Gateway-encoded: a redirector carrying the magnet in its path,
    //    e.g. //keepshare.org/abc123/magnet:%3Fxt=urn:btih:...
    let gateway = document.select(&anchors).find_map(|a| {
        a.value()
            .attr("href")
            .filter(|h| h.contains("keepshare.org"))
            .map(str::to_string)
    });
    if let Some(href) = gateway {
        if let Some(idx) = href.find("/magnet:") {
            let encoded = &href[idx + 1..];
            if let Ok(decoded) = percent_decode_str(encoded).decode_utf8() {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        }
    }

    // 3. Fallback: any anchor with a magnet fragment, decoded if necessary.
    let fallback = document.select(&anchors).find_map(|a| {
        a.value()
            .attr("href")
            .filter(|h| h.contains("magnet:") || h.contains("magnet%3A"))
            .map(str::to_string)
    });
    if let Some(href) = fallback {
        return magnet_from_href(&href);
    }

    None
}

/// Pull a magnet URI out of an href, percent-decoding when it is embedded
fn magnet_from_href(href: &str) -> Option<String> {
    if href.starts_with("magnet:") {
        return Some(href.to_string());
    }

    if href.contains("magnet:") || href.contains("magnet%3A") {
        let decoded = percent_decode_str(href).decode_utf8().ok()?;
        if let Some(idx) = decoded.find("magnet:") {
            return Some(decoded[idx..].to_string());
        }
    }

    None
}
