//! Page fetching from URLs, files, and stdin.
//!
//! [`Fetcher`] performs the single HTTP GET an extraction needs. It presents a
//! desktop-browser identity, follows redirects, and classifies every failure
//! into a [`FetchError`]. Local markup can be read with [`fetch_file`] and
//! [`fetch_stdin`].

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, redirect};
use tracing::debug;
use url::Url;

use crate::{Diagnostics, FetchError, LinkHarvestError, Result};

/// Browser identity and redirect policy for the HTTP client.
///
/// The defaults mimic a desktop Chrome so that sites with simple bot
/// filters serve the same markup a visitor would see.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User-Agent header.
    pub user_agent: String,
    /// Accept header.
    pub accept: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Accept-Encoding header.
    pub accept_encoding: String,
    /// Redirects followed before giving up with [`FetchError::TooManyRedirects`].
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8".to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            accept_encoding: "gzip, deflate, br".to_string(),
            max_redirects: 10,
        }
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL after redirects; relative links resolve against this.
    pub final_url: Url,
    pub status_code: u16,
    /// Raw body bytes.
    pub content: Vec<u8>,
    /// Content-Type header, or `"unknown"`.
    pub content_type: String,
    /// Whether `final_url` differs from the requested URL.
    pub redirected: bool,
}

/// HTTP client with a persistent browser identity.
///
/// The underlying [`Client`] pools connections and is safe to share, so one
/// `Fetcher` can serve concurrent extractions. The timeout is applied per call.
///
/// # Example
///
/// ```rust,no_run
/// use linkharvest_core::{Diagnostics, Fetcher};
///
/// # async fn example() -> linkharvest_core::Result<()> {
/// let fetcher = Fetcher::new()?;
/// let mut diagnostics = Diagnostics::default();
/// match fetcher.fetch("https://example.com", 10, &mut diagnostics).await {
///     Ok(page) => println!("{} bytes from {}", page.content.len(), page.final_url),
///     Err(e) => println!("failed: {e} (status {:?})", diagnostics.status_code),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with the default browser identity.
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Creates a fetcher with a custom identity.
    ///
    /// # Errors
    ///
    /// Returns [`LinkHarvestError::InvalidHeader`] if a header value contains
    /// illegal characters, or [`LinkHarvestError::HttpClient`] if the client
    /// cannot be built.
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, header_value("Accept", &config.accept)?);
        headers.insert(header::ACCEPT_LANGUAGE, header_value("Accept-Language", &config.accept_language)?);
        headers.insert(header::ACCEPT_ENCODING, header_value("Accept-Encoding", &config.accept_encoding)?);
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(LinkHarvestError::HttpClient)?;

        Ok(Self { client })
    }

    /// Fetches `url`, recording what was observed into `diagnostics`.
    ///
    /// Whenever a response arrives, its status code, content type, final URL,
    /// redirect flag and (once read) content length are recorded, including
    /// when the status is then classified as a failure. Transport failures
    /// with no response leave `diagnostics` untouched. Never retries.
    pub async fn fetch(
        &self, url: &str, timeout: u64, diagnostics: &mut Diagnostics,
    ) -> std::result::Result<FetchResult, FetchError> {
        let requested =
            Url::parse(url).map_err(|e| FetchError::GenericRequestFailure(format!("Invalid URL '{url}': {e}")))?;

        debug!(url = %requested, timeout, "fetching page");

        let response = self
            .client
            .get(requested.clone())
            .timeout(Duration::from_secs(timeout))
            .send()
            .await
            .map_err(|e| FetchError::from_transport(&e, timeout))?;

        let status = response.status();
        let final_url = response.url().clone();
        let redirected = final_url != requested;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        diagnostics.status_code = Some(status.as_u16());
        diagnostics.content_type = Some(content_type.clone());
        diagnostics.final_url = Some(final_url.to_string());
        diagnostics.redirected = Some(redirected);

        let content = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_transport(&e, timeout))?
            .to_vec();
        diagnostics.content_length = Some(content.len());

        debug!(status = status.as_u16(), bytes = content.len(), final_url = %final_url, "received response");

        classify_status(status)?;

        Ok(FetchResult { final_url, status_code: status.as_u16(), content, content_type, redirected })
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| LinkHarvestError::InvalidHeader { name })
}

/// Maps a final (post-redirect) status onto the fetch outcome.
fn classify_status(status: StatusCode) -> std::result::Result<(), FetchError> {
    match status {
        StatusCode::FORBIDDEN => Err(FetchError::Forbidden),
        StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound),
        s if s.is_success() => Ok(()),
        s => Err(FetchError::GenericRequestFailure(format!("HTTP {s}"))),
    }
}

/// Reads HTML content from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(LinkHarvestError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(LinkHarvestError::from)
    }
}

/// Reads HTML content from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(LinkHarvestError::from)?;

    Ok(buffer)
}
