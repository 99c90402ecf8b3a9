//! Scoped headless-browser sessions
//!
//! Each search and each magnet extraction runs in its own browser process.
//! Sessions must be closed on every exit path; the CDP handler task is
//! aborted when the session is dropped.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::ScrapeError;

/// Polling step while waiting for an element to appear
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One headless browser process plus its CDP event pump
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a fresh headless browser
    pub async fn launch() -> Result<Self, ScrapeError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(ScrapeError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open a new page and navigate it, bounded by `nav_timeout`
    pub async fn open(&self, url: &str, nav_timeout: Duration) -> Result<Page, ScrapeError> {
        let page = self.browser.new_page("about:blank").await?;
        navigate(&page, url, nav_timeout).await?;
        Ok(page)
    }

    /// Most recently opened page, for steps that spawn a new tab
    pub async fn newest_page(&self) -> Result<Option<Page>, ScrapeError> {
        let pages = self.browser.pages().await?;
        Ok(pages.into_iter().last())
    }

    /// Close the browser process. Always call this; relying on drop leaks
    /// the Chromium process until the handler task is reaped.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Navigate a page and wait for the load to settle
pub async fn navigate(page: &Page, url: &str, t: Duration) -> Result<(), ScrapeError> {
    let nav = async {
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    };

    match timeout(t, nav).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(ScrapeError::Timeout {
            what: "navigation",
            timeout: t,
        }),
    }
}

/// Poll for an element until it appears or the timeout elapses
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    t: Duration,
) -> Result<Element, ScrapeError> {
    let deadline = tokio::time::Instant::now() + t;
    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ScrapeError::Timeout {
                what: "element",
                timeout: t,
            });
        }
        sleep(ELEMENT_POLL_INTERVAL).await;
    }
}

/// Give an in-flight navigation time to settle after a submit or click.
/// The wait is soft: a timeout is logged and swallowed since many result
/// pages keep polling endpoints open.
pub async fn settle(page: &Page, delay: Duration, t: Duration) {
    sleep(delay).await;
    if timeout(t, page.wait_for_navigation()).await.is_err() {
        debug!("Page load wait timed out, continuing with current content");
    }
}

/// Write the rendered HTML and a full-page screenshot under `dir` for
/// per-site selector debugging. Failures are logged and swallowed.
pub async fn capture_page(page: &Page, dir: &Path, label: &str) {
    let stamp = chrono::Utc::now().timestamp();
    let safe: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let html_dir = dir.join("html");
    let shot_dir = dir.join("screenshots");
    for d in [&html_dir, &shot_dir] {
        if let Err(e) = tokio::fs::create_dir_all(d).await {
            warn!(error = %e, "Failed to create capture directory");
            return;
        }
    }

    match page.content().await {
        Ok(html) => {
            let path = html_dir.join(format!("{}_{}.html", safe, stamp));
            if let Err(e) = tokio::fs::write(&path, html).await {
                warn!(error = %e, "Failed to save page HTML");
            } else {
                debug!(path = %path.display(), "Saved page HTML");
            }
        }
        Err(e) => warn!(error = %e, "Failed to read page content for capture"),
    }

    let params = ScreenshotParams::builder().full_page(true).build();
    match page.screenshot(params).await {
        Ok(bytes) => {
            let path = shot_dir.join(format!("{}_{}.png", safe, stamp));
            if let Err(e) = tokio::fs::write(&path, bytes).await {
                warn!(error = %e, "Failed to save screenshot");
            } else {
                debug!(path = %path.display(), "Saved screenshot");
            }
        }
        Err(e) => warn!(error = %e, "Failed to take screenshot"),
    }
}
