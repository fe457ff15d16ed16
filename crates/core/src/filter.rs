//! Same-origin filtering.

use url::Url;

/// Which validated links survive an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainScope {
    /// Every validated link.
    #[default]
    All,
    /// Only links whose host matches the source page.
    SameOriginOnly,
}

impl DomainScope {
    /// Derives the scope from the two request flags.
    ///
    /// Restriction is opt-in and only takes effect when external links are
    /// excluded as well; every other combination keeps all links.
    pub fn from_flags(filter_domain: bool, include_external: bool) -> Self {
        if filter_domain && !include_external { Self::SameOriginOnly } else { Self::All }
    }

    /// Applies the scope to one canonical link.
    pub fn admits(&self, candidate: &str, base: &Url) -> bool {
        match self {
            Self::All => true,
            Self::SameOriginOnly => is_same_origin(candidate, base),
        }
    }
}

/// True when `candidate` has the same host (and port) as `base`.
///
/// Scheme and path are ignored. An unparseable candidate is never same-origin.
///
/// # Example
///
/// ```rust
/// use linkharvest_core::is_same_origin;
/// use url::Url;
///
/// let base = Url::parse("https://a.com").unwrap();
/// assert!(is_same_origin("https://a.com/x", &base));
/// assert!(is_same_origin("http://a.com/y", &base));
/// assert!(!is_same_origin("https://b.com", &base));
/// ```
pub fn is_same_origin(candidate: &str, base: &Url) -> bool {
    Url::parse(candidate).is_ok_and(|url| url.host_str() == base.host_str() && url.port() == base.port())
}
