//! Error types for link harvesting.
//!
//! Three families live here:
//!
//! - [`FetchError`]: the classified outcome of a failed page fetch.
//! - [`ParseFailure`]: no parser strategy could interpret the response body.
//! - [`BrowserError`]: the headless-browser path could not produce markup.
//!
//! None of these escape [`crate::LinkExtractor::extract`]; they are folded into
//! the [`crate::Diagnostics`] record as soft failures. [`LinkHarvestError`] covers
//! the remaining hard failures (bad caller input, client construction, local I/O).
//!
//! # Example
//!
//! ```rust
//! use linkharvest_core::FetchError;
//!
//! let err = FetchError::Forbidden;
//! assert!(err.to_string().contains("forbidden"));
//! assert_eq!(err.status_code(), Some(403));
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Classified failure of a single page fetch.
///
/// The `Display` output of each variant is the human-readable message that ends
/// up in the `error` diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP 403.
    #[error("Access forbidden (403). The website may be blocking automated requests.")]
    Forbidden,

    /// HTTP 401.
    #[error("Unauthorized (401). The website may require authentication.")]
    Unauthorized,

    /// HTTP 404.
    #[error("Page not found (404).")]
    NotFound,

    /// The request (including reading the body) exceeded the caller's timeout.
    #[error("Request timed out after {timeout} seconds.")]
    Timeout { timeout: u64 },

    /// DNS failure, refused connection, TLS handshake failure and the like.
    #[error("Connection error. Check your internet connection or the URL.")]
    ConnectionFailure,

    /// The redirect policy gave up.
    #[error("Too many redirects. The URL may be redirecting in a loop.")]
    TooManyRedirects,

    /// Any other request failure, including unclassified non-2xx statuses.
    #[error("Request failed: {0}")]
    GenericRequestFailure(String),

    /// A failure the transport could not categorize.
    #[error("Unexpected error: {0}")]
    UnexpectedFailure(String),
}

impl FetchError {
    /// HTTP status code implied by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Forbidden => Some(403),
            Self::Unauthorized => Some(401),
            Self::NotFound => Some(404),
            _ => None,
        }
    }

    /// Classifies a reqwest transport error.
    ///
    /// Uses reqwest's typed predicates; the error text is only carried along
    /// for the generic variants.
    pub(crate) fn from_transport(err: &reqwest::Error, timeout: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout }
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else if err.is_connect() {
            Self::ConnectionFailure
        } else if err.is_request() || err.is_body() || err.is_decode() || err.is_builder() || err.is_status() {
            Self::GenericRequestFailure(err.to_string())
        } else {
            Self::UnexpectedFailure(err.to_string())
        }
    }
}

/// No parser strategy accepted the document body.
///
/// `attempted` lists the strategies in the order they were tried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse HTML with any parser")]
pub struct ParseFailure {
    pub attempted: Vec<&'static str>,
}

/// Failure on the headless-browser path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    /// No browser binary, or the build lacks the `browser` feature.
    #[error("Browser automation is not available: {0}")]
    Unavailable(String),

    /// Navigation did not finish and the page could not be stopped.
    #[error("Page load timeout after {timeout} seconds. The website took too long to load.")]
    Timeout { timeout: u64 },

    /// The rendered markup was missing or implausibly short.
    #[error("Page source is empty or too small - page may not have loaded")]
    EmptyPage,

    /// Any other driver-reported failure.
    #[error("Browser automation failed: {0}")]
    Driver(String),
}

/// Hard failures: problems with the caller's input or the local environment.
///
/// # Example
///
/// ```rust
/// use linkharvest_core::{LinkHarvestError, Result};
///
/// fn base(url: &str) -> Result<url::Url> {
///     url::Url::parse(url).map_err(|e| LinkHarvestError::InvalidUrl(e.to_string()))
/// }
///
/// assert!(base("not a url").is_err());
/// ```
#[derive(Error, Debug)]
pub enum LinkHarvestError {
    /// The caller supplied a URL that cannot serve as a base.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built (TLS backend, header values).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// A configured request header is not a valid header value.
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },

    /// An input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Reading local input failed.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for [`LinkHarvestError`].
pub type Result<T> = std::result::Result<T, LinkHarvestError>;
