//! Candidate link discovery.
//!
//! Runs every extraction strategy over a parsed [`Document`] and unions the
//! results:
//!
//! - `href` on `<a>`, `<link>` and `<area>`;
//! - `routerlink` attributes (single-page-app routers);
//! - absolute URLs inside `<script>` text;
//! - `data-href` attributes;
//! - `http` strings in JSON-LD objects.
//!
//! Attribute values are resolved against the page URL. Script and JSON-LD
//! matches are already absolute and are passed through as written. Nothing is
//! validated here; that is the job of [`crate::normalize`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::ParseFailure;
use crate::parse::{Document, ParserChain};

/// Absolute URL inside script text: scheme, then anything but whitespace,
/// quotes and angle brackets.
#[allow(clippy::unwrap_used)]
static SCRIPT_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());

/// `href` prefixes that never point at a page.
const NON_NAVIGABLE_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "#", "data:"];

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSource {
    Anchor,
    LinkTag,
    Area,
    RouterLink,
    Script,
    DataHref,
    JsonLd,
}

/// A raw string harvested from markup, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: String,
    pub source: LinkSource,
}

impl CandidateLink {
    fn new(url: impl Into<String>, source: LinkSource) -> Self {
        Self { url: url.into(), source }
    }
}

/// Output of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Candidates in discovery order; duplicates are kept.
    pub candidates: Vec<CandidateLink>,
    /// Number of `<a>` elements carrying an `href`, skipped ones included.
    pub anchor_tags_found: usize,
    /// Parser strategy that produced the document.
    pub parser: &'static str,
}

impl IntoIterator for Discovery {
    type Item = CandidateLink;
    type IntoIter = std::vec::IntoIter<CandidateLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Parses `body` with `parsers` and discovers candidates against `base`.
///
/// `base` must be the page's final (post-redirect) URL.
///
/// # Errors
///
/// Returns [`ParseFailure`] when no parser accepts the body.
///
/// # Example
///
/// ```rust
/// use linkharvest_core::discover::{LinkSource, discover};
/// use linkharvest_core::parse::ParserChain;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let html = br#"<a href="intro">Intro</a><div routerlink="/app/home"></div>"#;
/// let found = discover(html, &base, &ParserChain::default()).unwrap();
///
/// assert_eq!(found.anchor_tags_found, 1);
/// assert_eq!(found.candidates[0].url, "https://example.com/docs/intro");
/// assert_eq!(found.candidates[1].source, LinkSource::RouterLink);
/// ```
pub fn discover(body: &[u8], base: &Url, parsers: &ParserChain) -> Result<Discovery, ParseFailure> {
    let doc = parsers.parse(body)?;
    Ok(discover_document(&doc, base))
}

/// Runs every strategy over an already parsed document.
pub fn discover_document(doc: &Document, base: &Url) -> Discovery {
    let mut discovery = Discovery { parser: doc.parser(), ..Default::default() };

    let anchors = collect_hrefs(doc, "a[href]", "href", LinkSource::Anchor, base, &mut discovery);
    discovery.anchor_tags_found = anchors;
    collect_hrefs(doc, "link[href]", "href", LinkSource::LinkTag, base, &mut discovery);
    collect_hrefs(doc, "area[href]", "href", LinkSource::Area, base, &mut discovery);
    collect_hrefs(doc, "[routerlink]", "routerlink", LinkSource::RouterLink, base, &mut discovery);
    collect_script_urls(doc, &mut discovery);
    collect_data_hrefs(doc, base, &mut discovery);
    collect_json_ld(doc, &mut discovery);

    debug!(
        candidates = discovery.candidates.len(),
        anchors = discovery.anchor_tags_found,
        parser = discovery.parser,
        "discovery finished"
    );

    discovery
}

/// True for attribute values worth resolving as page links.
fn is_navigable(href: &str) -> bool {
    if href.is_empty() {
        return false;
    }
    let lower = href.to_ascii_lowercase();
    !NON_NAVIGABLE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(String::from)
}

/// Collects navigable `attr` values of elements matching `selector`.
///
/// Returns how many elements matched, skipped values included.
fn collect_hrefs(
    doc: &Document, selector: &str, attr: &str, source: LinkSource, base: &Url, discovery: &mut Discovery,
) -> usize {
    let Some(elements) = doc.select(selector) else {
        return 0;
    };

    for element in &elements {
        let Some(value) = element.attr(attr).map(str::trim) else {
            continue;
        };
        if !is_navigable(value) {
            continue;
        }
        if let Some(url) = resolve(base, value) {
            discovery.candidates.push(CandidateLink::new(url, source));
        }
    }

    elements.len()
}

fn collect_script_urls(doc: &Document, discovery: &mut Discovery) {
    let Some(scripts) = doc.select("script") else {
        return;
    };

    for script in scripts {
        let text = script.text();
        for found in SCRIPT_URL_RE.find_iter(&text) {
            discovery.candidates.push(CandidateLink::new(found.as_str(), LinkSource::Script));
        }
    }
}

/// `data-href` only filters out empty and `javascript:` values.
fn collect_data_hrefs(doc: &Document, base: &Url, discovery: &mut Discovery) {
    let Some(elements) = doc.select("[data-href]") else {
        return;
    };

    for element in elements {
        let Some(value) = element.attr("data-href").map(str::trim) else {
            continue;
        };
        if value.is_empty() || value.to_ascii_lowercase().starts_with("javascript:") {
            continue;
        }
        if let Some(url) = resolve(base, value) {
            discovery.candidates.push(CandidateLink::new(url, LinkSource::DataHref));
        }
    }
}

fn collect_json_ld(doc: &Document, discovery: &mut Discovery) {
    let Some(blocks) = doc.select(r#"script[type="application/ld+json"]"#) else {
        return;
    };

    for block in blocks {
        let text = block.text();
        let value = match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "skipping malformed JSON-LD block");
                continue;
            }
        };

        for url in json_ld_urls(&value) {
            discovery.candidates.push(CandidateLink::new(url, LinkSource::JsonLd));
        }
    }
}

/// Top-level `http` strings of a JSON-LD object, directly or inside arrays,
/// each cut at its first `#`. Nested objects and non-object roots yield nothing.
fn json_ld_urls(value: &Value) -> Vec<&str> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for property in object.values() {
        match property {
            Value::String(_) => urls.extend(http_prefixed(property)),
            Value::Array(items) => urls.extend(items.iter().filter_map(http_prefixed)),
            _ => {}
        }
    }
    urls
}

fn http_prefixed(value: &Value) -> Option<&str> {
    let s = value.as_str()?;
    s.starts_with("http").then(|| s.split('#').next().unwrap_or(s))
}
