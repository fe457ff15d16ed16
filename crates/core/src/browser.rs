//! Headless-browser extraction for script-rendered pages.
//!
//! The rendering side is abstracted behind [`PageSession`] so the waiting and
//! extraction logic can run against any driver. With the `browser` feature the
//! crate ships [`ChromiumSession`], backed by chromiumoxide.
//!
//! A browser extraction:
//!
//! 1. navigates, giving up after `page_load_timeout` and stopping the load so
//!    the partial document can still be read;
//! 2. polls the anchor count until it holds steady (see
//!    [`wait_for_stable_anchors`]);
//! 3. reads the rendered markup and runs it through the same discovery,
//!    normalization and filtering pipeline as a plain fetch.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::BrowserError;
use crate::diagnostics::{Diagnostics, ExtractionMethod};
use crate::extractor::{Extraction, ExtractionConfig, harvest};
use crate::parse::ParserChain;

/// Rendered markup shorter than this is treated as a page that never loaded.
pub const MIN_RENDERED_MARKUP: usize = 100;

const PAGE_LOAD_WARNING: &str = "Page load timeout - extracting from partially loaded content";

/// Browser-path timing and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Upper bound on the anchor-count polling phase.
    pub wait_time: Duration,

    /// How long navigation may run before loading is stopped.
    pub page_load_timeout: Duration,

    /// Consecutive equal anchor counts that end the wait.
    pub stable_after: u32,

    /// Delay between anchor-count samples.
    pub poll_interval: Duration,

    /// User agent presented by the browser.
    pub user_agent: String,
}

impl BrowserConfig {
    /// Derives the browser timings from the request's fetch timeout and wait
    /// time, both in seconds.
    ///
    /// Page loads get three times the fetch timeout, and never less than a
    /// minute.
    pub fn for_timeouts(timeout: u64, wait_time: u64) -> Self {
        Self {
            wait_time: Duration::from_secs(wait_time),
            page_load_timeout: Duration::from_secs(timeout.saturating_mul(3).max(60)),
            stable_after: 3,
            poll_interval: Duration::from_secs(1),
            user_agent: crate::fetch::FetcherConfig::default().user_agent,
        }
    }

    /// Number of anchor-count samples the wait may take.
    fn max_polls(&self) -> u128 {
        self.wait_time.as_millis() / self.poll_interval.as_millis().max(1)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::for_timeouts(10, 15)
    }
}

/// One browser tab, as seen by the extraction logic.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigates and waits for the load event.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Stops any in-flight loading.
    async fn stop_loading(&mut self) -> Result<(), BrowserError>;

    /// URL currently shown, after redirects.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Number of `<a>` elements in the live DOM.
    async fn anchor_count(&self) -> Result<usize, BrowserError>;

    /// Serialized markup of the live DOM.
    async fn html(&self) -> Result<String, BrowserError>;

    async fn title(&self) -> Result<Option<String>, BrowserError>;

    /// Releases the tab and anything behind it.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// How the anchor-count wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stabilization {
    /// Samples taken.
    pub polls: u32,
    /// Last anchor count observed.
    pub anchors: usize,
    /// Whether the count held for `stable_after` samples before the wait ran out.
    pub settled: bool,
}

/// Polls the anchor count until it stops changing.
///
/// The baseline starts at zero. Every `poll_interval` a sample is taken; a
/// sample equal to the baseline counts towards `stable_after`, a different one
/// becomes the new baseline and resets the streak. Failed samples are skipped.
/// The wait never exceeds `wait_time` and is best effort: an unsettled page is
/// extracted anyway.
pub async fn wait_for_stable_anchors<S>(session: &S, config: &BrowserConfig) -> Stabilization
where
    S: PageSession + ?Sized,
{
    let mut outcome = Stabilization { polls: 0, anchors: 0, settled: false };
    let mut streak = 0;

    for _ in 0..config.max_polls() {
        tokio::time::sleep(config.poll_interval).await;
        outcome.polls += 1;

        let count = match session.anchor_count().await {
            Ok(count) => count,
            Err(e) => {
                debug!(error = %e, "anchor count unavailable");
                continue;
            }
        };

        if count == outcome.anchors {
            streak += 1;
            if streak >= config.stable_after {
                outcome.settled = true;
                break;
            }
        } else {
            outcome.anchors = count;
            streak = 0;
        }
    }

    outcome
}

struct RenderedPage {
    html: String,
    url: String,
    title: Option<String>,
}

async fn render<S>(
    session: &mut S, url: &str, config: &BrowserConfig, diagnostics: &mut Diagnostics,
) -> Result<RenderedPage, BrowserError>
where
    S: PageSession + ?Sized,
{
    let navigation = tokio::time::timeout(config.page_load_timeout, session.navigate(url)).await;
    match navigation {
        Ok(result) => result?,
        Err(_) => {
            warn!(url, timeout = ?config.page_load_timeout, "page load timed out, stopping");
            session
                .stop_loading()
                .await
                .map_err(|_| BrowserError::Timeout { timeout: config.page_load_timeout.as_secs() })?;
            diagnostics.page_load_warning = Some(PAGE_LOAD_WARNING.to_string());
        }
    }

    let stabilization = wait_for_stable_anchors(session, config).await;
    debug!(
        polls = stabilization.polls,
        anchors = stabilization.anchors,
        settled = stabilization.settled,
        "anchor wait finished"
    );

    let html = session.html().await?;
    if html.len() < MIN_RENDERED_MARKUP {
        return Err(BrowserError::EmptyPage);
    }

    let title = session.title().await.unwrap_or_default();
    let current = session.current_url().await.unwrap_or_else(|_| url.to_string());

    Ok(RenderedPage { html, url: current, title })
}

/// Extracts links from `url` through an already open session.
///
/// Failures are soft, as with [`crate::LinkExtractor::extract`]. The session
/// is left open.
pub async fn extract_with_session<S>(
    session: &mut S, url: &str, config: &ExtractionConfig, browser_config: &BrowserConfig,
) -> Extraction
where
    S: PageSession + ?Sized,
{
    let mut diagnostics = Diagnostics::for_method(ExtractionMethod::BrowserAutomation);

    let origin = match Url::parse(url) {
        Ok(origin) => origin,
        Err(e) => return Extraction::failed(diagnostics, BrowserError::Driver(e.to_string()).to_string()),
    };

    let page = match render(session, url, browser_config, &mut diagnostics).await {
        Ok(page) => page,
        Err(e) => {
            warn!(url, error = %e, "browser extraction failed");
            return Extraction::failed(diagnostics, e.to_string());
        }
    };

    let page_url = Url::parse(&page.url).unwrap_or_else(|_| origin.clone());
    diagnostics.content_length = Some(page.html.len());
    diagnostics.redirected = Some(page_url != origin);
    diagnostics.final_url = Some(page.url);
    diagnostics.page_title = page.title;

    let extraction = harvest(
        &ParserChain::default(),
        page.html.as_bytes(),
        &page_url,
        &origin,
        config.scope(),
        diagnostics,
    );

    info!(url, links = extraction.links.len(), "browser extraction finished");
    extraction
}

/// Launches a headless Chromium, extracts links from `url`, and shuts it down.
#[cfg(feature = "browser")]
pub async fn extract_with_browser(url: &str, config: &ExtractionConfig, browser_config: &BrowserConfig) -> Extraction {
    let mut session = match chromium::ChromiumSession::launch(browser_config).await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "could not start browser");
            return Extraction::failed(Diagnostics::for_method(ExtractionMethod::BrowserAutomation), e.to_string());
        }
    };

    let extraction = extract_with_session(&mut session, url, config, browser_config).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "browser did not shut down cleanly");
    }
    extraction
}

/// Always a soft failure: this build has no browser driver.
#[cfg(not(feature = "browser"))]
pub async fn extract_with_browser(url: &str, _config: &ExtractionConfig, _browser_config: &BrowserConfig) -> Extraction {
    warn!(url, "browser extraction requested without the browser feature");
    let error = BrowserError::Unavailable("built without the `browser` feature".to_string());
    Extraction::failed(Diagnostics::for_method(ExtractionMethod::BrowserAutomation), error.to_string())
}

#[cfg(feature = "browser")]
pub use chromium::ChromiumSession;

#[cfg(feature = "browser")]
mod chromium {
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
    use chromiumoxide::error::CdpError;
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use tokio::task::JoinHandle;

    use super::{BrowserConfig, PageSession};
    use crate::BrowserError;

    fn driver_error(err: CdpError) -> BrowserError {
        BrowserError::Driver(err.to_string())
    }

    /// A single tab in a dedicated headless Chromium.
    pub struct ChromiumSession {
        browser: Browser,
        page: Page,
        handler: JoinHandle<()>,
    }

    impl ChromiumSession {
        /// Starts Chromium and opens a blank tab.
        pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
            let launch = LaunchConfig::builder()
                .arg("--headless=new")
                .arg("--disable-gpu")
                .arg("--no-sandbox")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-blink-features=AutomationControlled")
                .arg(format!("--user-agent={}", config.user_agent))
                .build()
                .map_err(BrowserError::Unavailable)?;

            let (browser, mut handler) =
                Browser::launch(launch).await.map_err(|e| BrowserError::Unavailable(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser.new_page("about:blank").await.map_err(driver_error)?;

            Ok(Self { browser, page, handler })
        }

        async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
            self.page
                .evaluate(script)
                .await
                .map_err(driver_error)?
                .into_value()
                .map_err(|e| BrowserError::Driver(e.to_string()))
        }
    }

    #[async_trait]
    impl PageSession for ChromiumSession {
        async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
            self.page.goto(url).await.map_err(driver_error)?;
            Ok(())
        }

        async fn stop_loading(&mut self) -> Result<(), BrowserError> {
            self.evaluate::<serde_json::Value>("window.stop(); null").await.map(|_| ())
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            self.page
                .url()
                .await
                .map_err(driver_error)?
                .map(|u| u.to_string())
                .ok_or_else(|| BrowserError::Driver("page has no URL".to_string()))
        }

        async fn anchor_count(&self) -> Result<usize, BrowserError> {
            self.evaluate("document.getElementsByTagName('a').length").await
        }

        async fn html(&self) -> Result<String, BrowserError> {
            self.page.content().await.map_err(driver_error)
        }

        async fn title(&self) -> Result<Option<String>, BrowserError> {
            self.page.get_title().await.map_err(driver_error)
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            let closed = self.browser.close().await.map(|_| ()).map_err(driver_error);
            self.handler.abort();
            closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const RENDERED: &str = r#"<html><head><title>Rendered App</title></head><body>
        <nav><a href="/home">Home</a><a href="docs/">Docs</a><a href="https://other.org/x">Out</a></nav>
        <p>Content filled in by client-side scripts after the initial load.</p>
        </body></html>"#;

    struct FakeSession {
        hang_on_navigate: bool,
        stop_fails: bool,
        counts: Mutex<VecDeque<usize>>,
        html: String,
        url: String,
        closed: bool,
    }

    impl FakeSession {
        fn new(counts: &[usize]) -> Self {
            Self {
                hang_on_navigate: false,
                stop_fails: false,
                counts: Mutex::new(counts.iter().copied().collect()),
                html: RENDERED.to_string(),
                url: "https://app.example.com/start/".to_string(),
                closed: false,
            }
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            if self.hang_on_navigate {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn stop_loading(&mut self) -> Result<(), BrowserError> {
            if self.stop_fails { Err(BrowserError::Driver("stop failed".to_string())) } else { Ok(()) }
        }

        async fn current_url(&self) -> Result<String, BrowserError> {
            Ok(self.url.clone())
        }

        async fn anchor_count(&self) -> Result<usize, BrowserError> {
            let mut counts = self.counts.lock().unwrap();
            let next = if counts.len() > 1 { counts.pop_front() } else { counts.front().copied() };
            next.ok_or_else(|| BrowserError::Driver("no count".to_string()))
        }

        async fn html(&self) -> Result<String, BrowserError> {
            Ok(self.html.clone())
        }

        async fn title(&self) -> Result<Option<String>, BrowserError> {
            Ok(Some("Rendered App".to_string()))
        }

        async fn close(&mut self) -> Result<(), BrowserError> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn test_config_timeouts() {
        let short = BrowserConfig::for_timeouts(10, 15);
        assert_eq!(short.page_load_timeout, Duration::from_secs(60));
        assert_eq!(short.wait_time, Duration::from_secs(15));

        let long = BrowserConfig::for_timeouts(30, 5);
        assert_eq!(long.page_load_timeout, Duration::from_secs(90));
        assert_eq!(long.max_polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_settles_on_steady_count() {
        let session = FakeSession::new(&[2, 5, 5, 5, 5]);
        let outcome = wait_for_stable_anchors(&session, &BrowserConfig::default()).await;

        assert_eq!(outcome, Stabilization { polls: 5, anchors: 5, settled: true });
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_bounded() {
        let counts: Vec<usize> = (1..=40).collect();
        let session = FakeSession::new(&counts);
        let config = BrowserConfig::for_timeouts(10, 15);

        let started = tokio::time::Instant::now();
        let outcome = wait_for_stable_anchors(&session, &config).await;

        assert!(!outcome.settled);
        assert_eq!(outcome.polls, 15);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_wait_time_skips_polling() {
        let session = FakeSession::new(&[1]);
        let outcome = wait_for_stable_anchors(&session, &BrowserConfig::for_timeouts(10, 0)).await;
        assert_eq!(outcome.polls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extracts_rendered_links() {
        let mut session = FakeSession::new(&[3]);
        let extraction = extract_with_session(
            &mut session,
            "https://app.example.com/start",
            &ExtractionConfig::default(),
            &BrowserConfig::default(),
        )
        .await;

        let (links, diagnostics) = extraction.into_sorted();
        assert_eq!(
            links,
            vec![
                "https://app.example.com/home",
                "https://app.example.com/start/docs",
                "https://other.org/x",
            ]
        );
        assert!(diagnostics.success);
        assert_eq!(diagnostics.method, Some(ExtractionMethod::BrowserAutomation));
        assert_eq!(diagnostics.page_title.as_deref(), Some("Rendered App"));
        assert_eq!(diagnostics.final_url.as_deref(), Some("https://app.example.com/start/"));
        assert_eq!(diagnostics.redirected, Some(true));
        assert_eq!(diagnostics.page_load_warning, None);
        assert!(!session.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_origin_scope_applies() {
        let mut session = FakeSession::new(&[3]);
        let config = ExtractionConfig::builder().filter_domain(true).include_external(false).build();
        let extraction =
            extract_with_session(&mut session, "https://app.example.com/start", &config, &BrowserConfig::default())
                .await;

        assert!(!extraction.links.contains("https://other.org/x"));
        assert_eq!(extraction.links.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_load_timeout_extracts_partial_content() {
        let mut session = FakeSession::new(&[3]);
        session.hang_on_navigate = true;

        let extraction = extract_with_session(
            &mut session,
            "https://app.example.com/start",
            &ExtractionConfig::default(),
            &BrowserConfig::default(),
        )
        .await;

        assert!(extraction.diagnostics.success);
        assert_eq!(extraction.diagnostics.page_load_warning.as_deref(), Some(PAGE_LOAD_WARNING));
        assert_eq!(extraction.links.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstoppable_load_is_timeout() {
        let mut session = FakeSession::new(&[3]);
        session.hang_on_navigate = true;
        session.stop_fails = true;

        let extraction = extract_with_session(
            &mut session,
            "https://app.example.com/start",
            &ExtractionConfig::default(),
            &BrowserConfig::default(),
        )
        .await;

        assert!(!extraction.diagnostics.success);
        assert!(extraction.links.is_empty());
        assert_eq!(
            extraction.diagnostics.error,
            Some(BrowserError::Timeout { timeout: 60 }.to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_markup_is_empty_page() {
        let mut session = FakeSession::new(&[0]);
        session.html = "<html></html>".to_string();

        let extraction = extract_with_session(
            &mut session,
            "https://app.example.com/start",
            &ExtractionConfig::default(),
            &BrowserConfig::default(),
        )
        .await;

        assert!(!extraction.diagnostics.success);
        assert_eq!(extraction.diagnostics.error, Some(BrowserError::EmptyPage.to_string()));
        assert_eq!(extraction.diagnostics.method, Some(ExtractionMethod::BrowserAutomation));
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_unavailable_without_feature() {
        let extraction =
            extract_with_browser("https://example.com", &ExtractionConfig::default(), &BrowserConfig::default()).await;

        assert!(!extraction.diagnostics.success);
        assert!(extraction.diagnostics.error.unwrap().contains("not available"));
    }
}
