//! HTML parsing with an ordered fallback chain.
//!
//! A response body is handed to a [`ParserChain`], which tries each
//! [`MarkupParser`] in order and keeps the first document one of them accepts.
//! The default chain is:
//!
//! 1. [`StrictHtml`]: UTF-8 body the HTML5 tree builder parses without errors;
//! 2. [`LenientHtml`]: any UTF-8 body, parse errors tolerated;
//! 3. [`LossyHtml`]: invalid UTF-8 decoded with replacement characters.
//!
//! Every strategy refuses binary content (bodies containing NUL bytes). When
//! all of them refuse, the chain reports a [`ParseFailure`].
//!
//! Bodies declared in a legacy charset are transcoded to UTF-8 with
//! [`decode_body`] before they reach the chain.
//!
//! # Example
//!
//! ```rust
//! use linkharvest_core::parse::ParserChain;
//!
//! let doc = ParserChain::default().parse(b"<p>Hello <a href=\"/x\">x</a>").unwrap();
//! assert_eq!(doc.parser(), "lenient-html");
//! assert_eq!(doc.select("a[href]").unwrap().len(), 1);
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::ParseFailure;

/// Bytes scanned for a `<meta>` charset declaration.
const SNIFF_LIMIT: usize = 1024;

#[allow(clippy::unwrap_used)]
static META_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_.:-]+)"#).unwrap());

/// Encoding a body declares for itself.
///
/// The `charset` parameter of `content_type` wins; otherwise the first
/// `<meta charset>` or `http-equiv` declaration in the first kilobyte is used.
pub fn declared_encoding(body: &[u8], content_type: Option<&str>) -> Option<&'static Encoding> {
    content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(body))
}

/// Transcodes a body declared in a non-UTF-8 charset to UTF-8.
///
/// UTF-8 and undeclared bodies are returned untouched, so invalid bytes in
/// them still reach the lossy parser.
pub fn decode_body<'a>(body: &'a [u8], content_type: Option<&str>) -> Cow<'a, [u8]> {
    match declared_encoding(body, content_type) {
        Some(encoding) if encoding != UTF_8 => {
            let (text, used, _) = encoding.decode(body);
            debug!(encoding = used.name(), "transcoding body to UTF-8");
            Cow::Owned(text.into_owned().into_bytes())
        }
        _ => Cow::Borrowed(body),
    }
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let label = META_CHARSET_RE.captures(head)?.get(1)?.as_bytes();
    Encoding::for_label(label).map(Encoding::output_encoding)
}

/// One way of turning a response body into a DOM.
///
/// Returns `None` when the strategy cannot interpret the body; the chain then
/// moves on to the next strategy.
pub trait MarkupParser: Send + Sync {
    /// Short identifier, recorded in diagnostics.
    fn name(&self) -> &'static str;

    /// Attempts to parse `body`.
    fn parse(&self, body: &[u8]) -> Option<Html>;
}

/// Accepts only well-formed UTF-8 documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictHtml;

impl MarkupParser for StrictHtml {
    fn name(&self) -> &'static str {
        "strict-html"
    }

    fn parse(&self, body: &[u8]) -> Option<Html> {
        if is_binary(body) {
            return None;
        }
        let text = std::str::from_utf8(body).ok()?;
        let html = Html::parse_document(text);
        html.errors.is_empty().then_some(html)
    }
}

/// Accepts any UTF-8 text, recovering from malformed markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientHtml;

impl MarkupParser for LenientHtml {
    fn name(&self) -> &'static str {
        "lenient-html"
    }

    fn parse(&self, body: &[u8]) -> Option<Html> {
        if is_binary(body) {
            return None;
        }
        let text = std::str::from_utf8(body).ok()?;
        Some(Html::parse_document(text))
    }
}

/// Decodes invalid UTF-8 lossily before parsing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossyHtml;

impl MarkupParser for LossyHtml {
    fn name(&self) -> &'static str {
        "lossy-html"
    }

    fn parse(&self, body: &[u8]) -> Option<Html> {
        if is_binary(body) {
            return None;
        }
        Some(Html::parse_document(&String::from_utf8_lossy(body)))
    }
}

fn is_binary(body: &[u8]) -> bool {
    body.contains(&0)
}

/// Ordered list of parser strategies.
pub struct ParserChain {
    parsers: Vec<Box<dyn MarkupParser>>,
}

impl ParserChain {
    /// Creates a chain from explicit strategies, tried in the given order.
    pub fn new(parsers: Vec<Box<dyn MarkupParser>>) -> Self {
        Self { parsers }
    }

    /// Names of the strategies in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// Parses `body` with the first strategy that accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure`] listing every strategy tried when none accepts.
    pub fn parse(&self, body: &[u8]) -> Result<Document, ParseFailure> {
        for parser in &self.parsers {
            if let Some(html) = parser.parse(body) {
                return Ok(Document { html, parser: parser.name() });
            }
            debug!(parser = parser.name(), "parser rejected body");
        }

        Err(ParseFailure { attempted: self.names() })
    }
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(vec![Box::new(StrictHtml), Box::new(LenientHtml), Box::new(LossyHtml)])
    }
}

impl std::fmt::Debug for ParserChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserChain").field("parsers", &self.names()).finish()
    }
}

/// A parsed HTML document.
///
/// Wraps the DOM produced by a [`MarkupParser`] and remembers which strategy
/// built it.
#[derive(Debug)]
pub struct Document {
    html: Html,
    parser: &'static str,
}

impl Document {
    /// Parses markup with the default [`ParserChain`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use linkharvest_core::parse::Document;
    ///
    /// let doc = Document::parse("<html><head><title>Test</title></head></html>").unwrap();
    /// assert_eq!(doc.title(), Some("Test".to_string()));
    /// ```
    pub fn parse(html: &str) -> Result<Self, ParseFailure> {
        ParserChain::default().parse(html.as_bytes())
    }

    /// Name of the strategy that produced this document.
    pub fn parser(&self) -> &'static str {
        self.parser
    }

    /// Selects elements using a CSS selector.
    ///
    /// Returns `None` if the selector does not parse.
    pub fn select(&'_ self, selector: &str) -> Option<Vec<Element<'_>>> {
        let sel = Selector::parse(selector).ok()?;
        Some(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Content of the `<title>` element, if present.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }
}

/// A wrapper around scraper's ElementRef.
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: scraper::ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the text content of this element.
    ///
    /// Returns the concatenation of all text nodes within this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    ///
    /// Attribute names are matched lowercased, as the HTML parser stores them.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "<!DOCTYPE html><html><head><title>Test Page</title></head>\
                               <body><p>Paragraph</p><a href=\"https://example.com\">Link</a></body></html>";

    #[test]
    fn test_strict_accepts_well_formed() {
        let doc = ParserChain::default().parse(WELL_FORMED.as_bytes()).unwrap();
        assert_eq!(doc.parser(), "strict-html");
        assert_eq!(doc.title(), Some("Test Page".to_string()));
    }

    #[test]
    fn test_strict_rejects_malformed() {
        assert!(StrictHtml.parse(b"<p>unclosed <b>bold").is_none());
        assert!(LenientHtml.parse(b"<p>unclosed <b>bold").is_some());
    }

    #[test]
    fn test_falls_back_to_lossy_for_invalid_utf8() {
        let body = b"<html><body><a href=\"/caf\xe9\">x</a></body></html>";
        let doc = ParserChain::default().parse(body).unwrap();

        assert_eq!(doc.parser(), "lossy-html");
        assert_eq!(doc.select("a[href]").unwrap().len(), 1);
    }

    #[test]
    fn test_binary_body_is_parse_failure() {
        let body = b"%PDF-1.4\x00\x01\x02\xff\xfe";
        let err = ParserChain::default().parse(body).unwrap_err();
        assert_eq!(err.attempted, vec!["strict-html", "lenient-html", "lossy-html"]);
    }

    #[test]
    fn test_binary_body_survives_declared_charset() {
        let body = b"<meta charset=\"windows-1252\">\x00\x01\xff";
        let decoded = decode_body(body, None);
        assert!(ParserChain::default().parse(&decoded).is_err());
    }

    #[test]
    fn test_decode_meta_charset() {
        let body = b"<html><head><meta charset=\"windows-1252\"></head><body><a href=\"/caf\xe9\">x</a></body></html>";
        let decoded = decode_body(body, Some("text/html"));
        let doc = ParserChain::default().parse(&decoded).unwrap();

        assert_eq!(doc.select("a").unwrap()[0].attr("href"), Some("/caf\u{e9}"));
        assert_ne!(doc.parser(), "lossy-html");
    }

    #[test]
    fn test_decode_http_equiv_charset() {
        let body = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\"><a href=\"/\xfcber\">";
        assert_eq!(declared_encoding(body, None).map(Encoding::name), Some("windows-1252"));

        let decoded = decode_body(body, None);
        let text = std::str::from_utf8(&decoded).unwrap();
        assert!(text.ends_with("<a href=\"/\u{fc}ber\">"));
    }

    #[test]
    fn test_content_type_charset_wins_over_meta() {
        let body = b"<meta charset=\"utf-8\"><a href=\"/caf\xe9\">";
        let encoding = declared_encoding(body, Some("text/html; Charset=\"windows-1252\""));
        assert_eq!(encoding.map(Encoding::name), Some("windows-1252"));
        assert_eq!(declared_encoding(body, Some("text/html")).map(Encoding::name), Some("UTF-8"));
    }

    #[test]
    fn test_utf8_and_undeclared_bodies_are_borrowed() {
        let utf8 = "<meta charset=\"utf-8\"><a href=\"/caf\u{e9}\">".as_bytes();
        assert!(matches!(decode_body(utf8, None), Cow::Borrowed(_)));

        let undeclared = b"<a href=\"/caf\xe9\">";
        assert!(matches!(decode_body(undeclared, Some("text/html")), Cow::Borrowed(_)));
        assert_eq!(declared_encoding(undeclared, Some("text/html; charset=bogus")), None);
    }

    #[test]
    fn test_custom_chain_order() {
        let chain = ParserChain::new(vec![Box::new(LossyHtml)]);
        assert_eq!(chain.names(), vec!["lossy-html"]);
        assert_eq!(chain.parse(b"<a href=x>").unwrap().parser(), "lossy-html");
    }

    #[test]
    fn test_empty_chain_always_fails() {
        let chain = ParserChain::new(Vec::new());
        assert!(chain.parse(b"<html></html>").is_err());
    }

    #[test]
    fn test_element_attributes() {
        let doc = Document::parse(WELL_FORMED).unwrap();
        let elements = doc.select("a").unwrap();

        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].attr("href"), Some("https://example.com"));
        assert_eq!(elements[0].text(), "Link");
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(WELL_FORMED).unwrap();
        assert!(doc.select("[[invalid").is_none());
    }
}
