//! Per-site scraper configuration
//!
//! Sites may carry a JSON blob overriding the selectors used for the search
//! flow, plus an optional ordered list of extraction steps for detail pages
//! whose magnet location needs navigation.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default selector for the search input
pub const DEFAULT_SEARCH_INPUT_SELECTOR: &str =
    "input[type='search'], input[name='q'], input[name='query'], input[name='search']";

/// Default CSS portion of the submit-button lookup. Buttons whose visible
/// text contains [`SEARCH_BUTTON_TEXT`] are matched separately since text
/// matching is not expressible in CSS.
pub const DEFAULT_SEARCH_BUTTON_SELECTOR: &str = "button[type='submit'], input[type='submit']";

/// Visible-text fallback for locating the submit button
pub const SEARCH_BUTTON_TEXT: &str = "Search";

/// Default selector for candidate links on the results page
pub const DEFAULT_LINK_SELECTOR: &str = "a";

/// Parsed per-site configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub search_input_selector: Option<String>,
    pub search_button_selector: Option<String>,
    pub link_selector: Option<String>,
    pub extraction_steps: Vec<ExtractionStep>,
}

/// One step of a config-driven detail-page extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStep {
    pub action: StepAction,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub attribute: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    /// Click an element on the current page
    Click,
    /// Click an element that opens a new page and switch to it
    ClickNewPage,
    /// Read an attribute (or "text") from an element and finish
    Extract,
}

impl SiteConfig {
    /// Parse a config blob, falling back to defaults on malformed JSON
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to parse site config, using defaults");
                Self::default()
            }
        }
    }

    pub fn search_input_selector(&self) -> &str {
        self.search_input_selector
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SEARCH_INPUT_SELECTOR)
    }

    /// Configured submit-button selector, if any. When absent the defaults
    /// (CSS plus visible-text scan) apply.
    pub fn search_button_selector(&self) -> Option<&str> {
        self.search_button_selector
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    pub fn link_selector(&self) -> &str {
        self.link_selector
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LINK_SELECTOR)
    }
}
