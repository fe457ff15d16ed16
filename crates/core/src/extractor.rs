//! Link extraction API.
//!
//! [`LinkExtractor`] runs the whole pipeline for one page: fetch, parse and
//! discover, normalize, filter by domain, deduplicate. Failures never surface
//! as `Err`: an extraction that cannot complete returns an empty [`LinkSet`]
//! with the reason recorded in its [`Diagnostics`].
//!
//! # Example
//!
//! ```rust,no_run
//! use linkharvest_core::{ExtractionConfig, LinkExtractor};
//!
//! # async fn example() -> linkharvest_core::Result<()> {
//! let extractor = LinkExtractor::new()?;
//! let config = ExtractionConfig::builder().filter_domain(true).include_external(false).build();
//! let (links, diagnostics) = extractor.get_all_links("https://example.com", &config).await;
//!
//! if let Some(error) = &diagnostics.error {
//!     eprintln!("extraction failed: {error}");
//! }
//! for link in links {
//!     println!("{link}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;

use tracing::{info, warn};
use url::Url;

use crate::diagnostics::{Diagnostics, ExtractionMethod};
use crate::discover::discover;
use crate::fetch::Fetcher;
use crate::filter::DomainScope;
use crate::normalize::normalize;
use crate::parse::{ParserChain, decode_body};
use crate::{LinkHarvestError, Result};

/// Per-call extraction options.
///
/// # Example
///
/// ```rust
/// use linkharvest_core::{DomainScope, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .filter_domain(true)
///     .include_external(false)
///     .timeout(5)
///     .build();
/// assert_eq!(config.scope(), DomainScope::SameOriginOnly);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Request same-origin filtering (default: false).
    pub filter_domain: bool,

    /// Keep links to other hosts (default: true).
    pub include_external: bool,

    /// Fetch timeout in seconds (default: 10).
    pub timeout: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { filter_domain: false, include_external: true, timeout: 10 }
    }
}

impl ExtractionConfig {
    /// Creates a new builder for ExtractionConfig.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder::new()
    }

    /// The effective domain policy.
    ///
    /// Same-origin restriction applies only when `filter_domain` is set and
    /// `include_external` is cleared.
    pub fn scope(&self) -> DomainScope {
        DomainScope::from_flags(self.filter_domain, self.include_external)
    }
}

/// Builder for ExtractionConfig.
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ExtractionConfig::default() }
    }

    /// Sets whether same-origin filtering is requested.
    pub fn filter_domain(mut self, value: bool) -> Self {
        self.config.filter_domain = value;
        self
    }

    /// Sets whether links to other hosts are kept.
    pub fn include_external(mut self, value: bool) -> Self {
        self.config.include_external = value;
        self
    }

    /// Sets the fetch timeout in seconds.
    pub fn timeout(mut self, value: u64) -> Self {
        self.config.timeout = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ExtractionConfig {
        self.config
    }
}

impl Default for ExtractionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical links, unique by exact string equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    links: HashSet<String>,
}

impl LinkSet {
    /// Adds a link; returns false if it was already present.
    pub fn insert(&mut self, link: String) -> bool {
        self.links.insert(link)
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    /// Links in lexicographic order.
    pub fn into_sorted(self) -> Vec<String> {
        let mut links: Vec<String> = self.links.into_iter().collect();
        links.sort();
        links
    }
}

impl FromIterator<String> for LinkSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { links: iter.into_iter().collect() }
    }
}

/// Result of one extraction call.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub links: LinkSet,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    /// An empty result carrying a failure reason.
    pub(crate) fn failed(mut diagnostics: Diagnostics, error: impl Into<String>) -> Self {
        diagnostics.fail(error);
        Self { links: LinkSet::default(), diagnostics }
    }

    /// Sorted links plus diagnostics, the form handed to external callers.
    pub fn into_sorted(self) -> (Vec<String>, Diagnostics) {
        (self.links.into_sorted(), self.diagnostics)
    }
}

/// Main entry point for link extraction.
///
/// Holds one [`Fetcher`] (a pooled client with a fixed browser identity) and
/// the parser chain. Both are read-only during extraction, so a single
/// `LinkExtractor` can serve concurrent calls; each call accumulates into its
/// own [`LinkSet`] and [`Diagnostics`].
#[derive(Debug)]
pub struct LinkExtractor {
    fetcher: Fetcher,
    parsers: ParserChain,
}

impl LinkExtractor {
    /// Creates an extractor with the default fetcher and parser chain.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        Ok(Self::with_fetcher(Fetcher::new()?))
    }

    /// Creates an extractor around an existing fetcher.
    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher, parsers: ParserChain::default() }
    }

    /// Replaces the parser chain.
    pub fn with_parsers(mut self, parsers: ParserChain) -> Self {
        self.parsers = parsers;
        self
    }

    /// Fetches `url` and extracts its links.
    ///
    /// Relative links resolve against the post-redirect URL; same-origin
    /// checks compare against `url` itself.
    pub async fn extract(&self, url: &str, config: &ExtractionConfig) -> Extraction {
        let mut diagnostics = Diagnostics::for_method(ExtractionMethod::Http);

        let page = match self.fetcher.fetch(url, config.timeout, &mut diagnostics).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url, error = %e, "fetch failed");
                return Extraction::failed(diagnostics, e.to_string());
            }
        };

        let origin = Url::parse(url).unwrap_or_else(|_| page.final_url.clone());
        let body = decode_body(&page.content, Some(&page.content_type));
        let extraction = harvest(&self.parsers, &body, &page.final_url, &origin, config.scope(), diagnostics);

        info!(url, links = extraction.links.len(), success = extraction.diagnostics.success, "extraction finished");
        extraction
    }

    /// Like [`extract`](Self::extract), returning the links sorted.
    pub async fn get_all_links(&self, url: &str, config: &ExtractionConfig) -> (Vec<String>, Diagnostics) {
        self.extract(url, config).await.into_sorted()
    }

    /// Extracts links from markup the caller already holds.
    ///
    /// `base_url` stands in for the page URL, both for resolving relative links
    /// and for same-origin checks. `config.timeout` is unused.
    ///
    /// # Errors
    ///
    /// Returns [`LinkHarvestError::InvalidUrl`] if `base_url` does not parse.
    pub fn extract_from_html(&self, html: &str, base_url: &str, config: &ExtractionConfig) -> Result<Extraction> {
        let base = Url::parse(base_url).map_err(|e| LinkHarvestError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut diagnostics = Diagnostics::for_method(ExtractionMethod::Local);
        diagnostics.content_length = Some(html.len());
        diagnostics.final_url = Some(base.to_string());

        Ok(harvest(&self.parsers, html.as_bytes(), &base, &base, config.scope(), diagnostics))
    }
}

/// Discover, normalize and filter the links of one body.
///
/// `page_url` resolves relative references; `origin` is the same-origin
/// reference. A body no parser accepts becomes a soft failure.
pub(crate) fn harvest(
    parsers: &ParserChain, body: &[u8], page_url: &Url, origin: &Url, scope: DomainScope,
    mut diagnostics: Diagnostics,
) -> Extraction {
    let discovery = match discover(body, page_url, parsers) {
        Ok(discovery) => discovery,
        Err(e) => {
            warn!(url = %page_url, attempted = ?e.attempted, "no parser accepted the body");
            return Extraction::failed(diagnostics, e.to_string());
        }
    };

    diagnostics.anchor_tags_found = Some(discovery.anchor_tags_found);
    diagnostics.parser = Some(discovery.parser.to_string());

    let links: LinkSet = discovery
        .into_iter()
        .filter_map(|candidate| normalize(&candidate.url))
        .filter(|link| scope.admits(link, origin))
        .collect();

    diagnostics.succeed(links.len());
    Extraction { links, diagnostics }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html>
        <head>
            <link rel="stylesheet" href="/static/site.css">
            <script type="application/ld+json">{"url": "https://example.com/#org", "sameAs": ["https://social.example/me"]}</script>
        </head>
        <body>
            <a href="/about">About</a>
            <a href="/about/">About again</a>
            <a href="/about#team">Team</a>
            <a href="https://other.com/x">Other</a>
            <a href="mailto:hi@example.com">Mail</a>
            <a href="#top">Top</a>
            <div data-href="/cards/7"></div>
            <script>window.cdn = "https://cdn.other.net/lib.js";</script>
        </body>
        </html>
    "##;

    fn extractor() -> LinkExtractor {
        LinkExtractor::new().unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ExtractionConfig::default();
        assert!(!config.filter_domain);
        assert!(config.include_external);
        assert_eq!(config.timeout, 10);
        assert_eq!(config.scope(), DomainScope::All);
    }

    #[test]
    fn test_config_builder() {
        let config = ExtractionConfig::builder().filter_domain(true).include_external(false).timeout(3).build();
        assert_eq!(config.timeout, 3);
        assert_eq!(config.scope(), DomainScope::SameOriginOnly);

        let only_filter = ExtractionConfig::builder().filter_domain(true).build();
        assert_eq!(only_filter.scope(), DomainScope::All);
    }

    #[test]
    fn test_extract_from_html_dedups_and_sorts() {
        let extraction = extractor()
            .extract_from_html(PAGE, "https://example.com/", &ExtractionConfig::default())
            .unwrap();
        let (links, diagnostics) = extraction.into_sorted();

        assert_eq!(
            links,
            vec![
                "https://cdn.other.net/lib.js",
                "https://example.com/",
                "https://example.com/about",
                "https://example.com/cards/7",
                "https://example.com/static/site.css",
                "https://other.com/x",
                "https://social.example/me",
            ]
        );
        assert!(diagnostics.success);
        assert_eq!(diagnostics.anchor_tags_found, Some(6));
        assert_eq!(diagnostics.unique_links_found, Some(7));
        assert_eq!(diagnostics.method, Some(ExtractionMethod::Local));
    }

    #[test]
    fn test_extract_from_html_same_origin_only() {
        let config = ExtractionConfig::builder().filter_domain(true).include_external(false).build();
        let extraction = extractor().extract_from_html(PAGE, "https://example.com/", &config).unwrap();
        let links = extraction.links.into_sorted();

        assert!(!links.is_empty());
        assert!(links.iter().all(|l| l.starts_with("https://example.com")));
    }

    #[test]
    fn test_filter_domain_alone_keeps_external() {
        let config = ExtractionConfig::builder().filter_domain(true).build();
        let extraction = extractor().extract_from_html(PAGE, "https://example.com/", &config).unwrap();
        assert!(extraction.links.contains("https://other.com/x"));
    }

    #[test]
    fn test_extract_from_html_invalid_base() {
        let result = extractor().extract_from_html(PAGE, "not a url", &ExtractionConfig::default());
        assert!(matches!(result, Err(LinkHarvestError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_failure_is_soft() {
        let extractor = LinkExtractor::new().unwrap().with_parsers(ParserChain::new(Vec::new()));
        let extraction = extractor
            .extract_from_html(PAGE, "https://example.com/", &ExtractionConfig::default())
            .unwrap();

        assert!(extraction.links.is_empty());
        assert!(!extraction.diagnostics.success);
        assert_eq!(
            extraction.diagnostics.error.as_deref(),
            Some("Failed to parse HTML with any parser")
        );
    }

    #[test]
    fn test_harvest_legacy_charset_page() {
        let body = b"<html><head><meta charset=\"windows-1252\"></head><body><a href=\"/caf\xe9\">Menu</a></body></html>";
        let page = Url::parse("https://e.com/").unwrap();
        let decoded = decode_body(body, Some("text/html"));

        let extraction = harvest(
            &ParserChain::default(),
            &decoded,
            &page,
            &page,
            DomainScope::All,
            Diagnostics::for_method(ExtractionMethod::Http),
        );

        assert_eq!(extraction.links.into_sorted(), vec!["https://e.com/caf%C3%A9"]);
    }

    #[test]
    fn test_link_set() {
        let mut set = LinkSet::default();
        assert!(set.insert("https://b.com".to_string()));
        assert!(set.insert("https://a.com".to_string()));
        assert!(!set.insert("https://a.com".to_string()));
        assert_eq!(set.len(), 2);
        assert_eq!(set.into_sorted(), vec!["https://a.com", "https://b.com"]);
    }
}
