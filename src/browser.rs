//! Headless browser rendering of search result pages.
//!
//! The search site builds its result list client-side, so a plain HTTP GET
//! only returns an empty shell. Pages are instead loaded in a throwaway
//! Chromium instance driven over CDP, and the markup is captured once the
//! results container is visible.
//!
//! # Architecture
//!
//! - [`RenderPage`]: the capability the crawler depends on
//! - [`ChromeRenderer`]: production implementation backed by `chromiumoxide`
//!
//! Every call launches its own browser with a fresh temporary profile and
//! tears it down again before returning, whatever the outcome. Nothing is
//! pooled between pages.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// How long teardown may take before the browser is abandoned.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by [`RenderPage::render`].
///
/// For the crawler every variant means "this page has no results"; none of
/// them is fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("timed out after {0:?} waiting for results container")]
    Timeout(Duration),
    #[error("failed to capture rendered markup: {0}")]
    Capture(String),
}

/// Load a URL in a browser and return the rendered document markup.
///
/// Implementations wait until an element matching `selector` is visible and
/// must give up once `timeout` has elapsed since the call started.
pub trait RenderPage {
    async fn render(
        &self,
        url: &str,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

/// [`RenderPage`] backed by a headless Chromium launched per call.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    /// Explicit browser binary; autodetected when `None`.
    chrome_executable: Option<PathBuf>,
    /// Delay between visibility probes.
    poll_interval: Duration,
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ChromeRenderer {
    pub fn new(chrome_executable: Option<PathBuf>) -> Self {
        Self {
            chrome_executable,
            poll_interval: Duration::from_millis(250),
        }
    }

    fn browser_config(&self, profile_dir: &std::path::Path) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(1366, 768)
            .args([
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--no-first-run",
                "--disable-default-apps",
                "--disable-extensions",
            ]);
        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(FetchError::Launch)
    }

    /// Navigate, wait for the results container, and read the markup.
    async fn capture(&self, browser: &Browser, url: &str, selector: &str) -> Result<String, FetchError> {
        let navigation_error = |e: chromiumoxide::error::CdpError| FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let page = browser.new_page("about:blank").await.map_err(navigation_error)?;
        page.goto(url).await.map_err(navigation_error)?;

        let probe = visibility_probe(selector);
        while !self.is_visible(&page, &probe).await {
            sleep(self.poll_interval).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Capture(e.to_string()))?;
        debug!(bytes = html.len(), "Captured rendered markup");
        Ok(html)
    }

    async fn is_visible(&self, page: &Page, probe: &str) -> bool {
        match page.evaluate(probe).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!(error = %e, "Visibility probe failed; retrying");
                false
            }
        }
    }
}

impl RenderPage for ChromeRenderer {
    #[instrument(level = "info", skip(self, selector))]
    async fn render(
        &self,
        url: &str,
        selector: &str,
        limit: Duration,
    ) -> Result<String, FetchError> {
        let started = Instant::now();

        let profile = tempfile::Builder::new()
            .prefix("yle-rss-profile-")
            .tempdir()
            .map_err(|e| FetchError::Launch(format!("temporary profile: {e}")))?;
        let config = self.browser_config(profile.path())?;

        let (mut browser, mut handler) = match timeout(limit, Browser::launch(config)).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(FetchError::Launch(e.to_string())),
            Err(_) => return Err(FetchError::Timeout(limit)),
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error (continuing)");
                }
            }
        });

        let remaining = limit.saturating_sub(started.elapsed());
        let outcome = match timeout(remaining, self.capture(&browser, url, selector)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(limit)),
        };

        // Teardown runs on every path before the next page may start.
        match timeout(CLEANUP_TIMEOUT, browser.close()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "Browser close error (ignored)"),
            Err(_) => warn!("Browser did not close in time"),
        }
        if timeout(CLEANUP_TIMEOUT, browser.wait()).await.is_err() {
            warn!("Browser process did not exit in time");
        }
        handler_task.abort();
        drop(profile);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(html) => info!(elapsed_ms, bytes = html.len(), "Rendered page"),
            Err(e) => info!(elapsed_ms, error = %e, "Render ended without results"),
        }
        outcome
    }
}

/// JavaScript expression that is `true` once `selector` matches a visible element.
fn visibility_probe(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ \
            const el = document.querySelector({quoted}); \
            if (!el) return false; \
            const style = window.getComputedStyle(el); \
            const rect = el.getBoundingClientRect(); \
            return style.display !== 'none' && style.visibility !== 'hidden' \
                && rect.width > 0 && rect.height > 0; \
        }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_probe_quotes_selector() {
        let probe = visibility_probe("div[class^='ArticleResults__SearchItemContainer']");
        assert!(probe.contains(
            r#"document.querySelector("div[class^='ArticleResults__SearchItemContainer']")"#
        ));
    }

    #[test]
    fn test_visibility_probe_escapes_double_quotes() {
        let probe = visibility_probe(r#"a[href="x"]"#);
        assert!(probe.contains(r#"document.querySelector("a[href=\"x\"]")"#));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Navigation {
            url: "https://haku.yle.fi/?page=3".to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "navigation to https://haku.yle.fi/?page=3 failed: net::ERR_NAME_NOT_RESOLVED"
        );
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(10)).to_string(),
            "timed out after 10s waiting for results container"
        );
    }

    #[test]
    fn test_default_renderer_autodetects_chrome() {
        let renderer = ChromeRenderer::default();
        assert!(renderer.chrome_executable.is_none());
        assert_eq!(renderer.poll_interval, Duration::from_millis(250));
    }
}
