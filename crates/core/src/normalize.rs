//! URL canonicalization and validation.
//!
//! [`normalize`] turns an absolute candidate into a canonical link or rejects
//! it. Rejection is silent: a candidate that fails here is simply not a link.
//! The returned string is the input with its fragment and trailing slashes
//! cut off. It is never re-serialized, so percent-encoding and letter case
//! survive untouched.

use url::Url;

/// Longest URL accepted, in characters.
pub const MAX_URL_LENGTH: usize = 2000;

/// Encoded markup fragments that show up when an `href` swallowed part of the
/// surrounding HTML. Compared against the lowercased URL.
const INJECTION_MARKERS: &[&str] = &["%22%3e", "%3c/a", "href%3d"];

const FORBIDDEN_AUTHORITY_CHARS: &[char] = &['<', '>', '"', '\''];

/// Canonicalizes an absolute URL, or returns `None` if it is not a usable link.
///
/// Steps, in order:
/// 1. drop everything from the first `#`;
/// 2. unless the path is exactly `/`, strip trailing slashes;
/// 3. validate with [`is_valid_url`].
///
/// The result is a fixed point: normalizing it again returns it unchanged.
///
/// # Example
///
/// ```rust
/// use linkharvest_core::normalize;
///
/// assert_eq!(normalize("https://e.com/p/#sec"), Some("https://e.com/p".to_string()));
/// assert_eq!(normalize("https://e.com/"), Some("https://e.com/".to_string()));
/// assert_eq!(normalize("mailto:someone@e.com"), None);
/// ```
pub fn normalize(raw: &str) -> Option<String> {
    let without_fragment = match raw.find('#') {
        Some(idx) => &raw[..idx],
        None => raw,
    };

    let trimmed = if without_fragment.ends_with('/') && !has_root_path(without_fragment) {
        without_fragment.trim_end_matches('/')
    } else {
        without_fragment
    };

    is_valid_url(trimmed).then(|| trimmed.to_string())
}

/// Checks that `url` is a well-formed, plausible `http`/`https` link.
///
/// Rejects:
/// - anything longer than [`MAX_URL_LENGTH`] characters;
/// - encoded markup such as `%22%3E`, `%3C/a` or `href%3D` (any case), while
///   ordinary escapes like `%20` pass;
/// - strings where `http://` or `https://` occurs more than once, which come
///   from links glued together;
/// - URLs that do not parse, use another scheme, or have an empty host;
/// - an authority containing `<`, `>`, `"` or `'`.
pub fn is_valid_url(url: &str) -> bool {
    if url.chars().count() > MAX_URL_LENGTH {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    if INJECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    if lower.matches("http://").count() > 1 || lower.matches("https://").count() > 1 {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return false;
    }

    !raw_authority(url).is_some_and(|authority| authority.contains(FORBIDDEN_AUTHORITY_CHARS))
}

fn has_root_path(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| u.path() == "/")
}

/// The text between `scheme://` and the next `/`, `?` or `#`, as written.
fn raw_authority(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://e.com/p#sec", "https://e.com/p")]
    #[case("https://e.com/p/", "https://e.com/p")]
    #[case("https://e.com/p///", "https://e.com/p")]
    #[case("https://e.com/p/#top", "https://e.com/p")]
    #[case("https://e.com/", "https://e.com/")]
    #[case("https://e.com", "https://e.com")]
    #[case("https://e.com/#", "https://e.com/")]
    #[case("https://e.com/a/b?q=1", "https://e.com/a/b?q=1")]
    #[case("https://e.com/search?q=a%20b", "https://e.com/search?q=a%20b")]
    #[case("http://e.com:8080/x/", "http://e.com:8080/x")]
    #[case("https://E.com/Path", "https://E.com/Path")]
    #[case("https://e.com/share?u=http://other.com/a", "https://e.com/share?u=http://other.com/a")]
    #[case("http://e.com/out?to=HTTPS://other.com", "http://e.com/out?to=HTTPS://other.com")]
    fn test_normalize_accepts(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).as_deref(), Some(expected));
    }

    #[rstest]
    #[case("e.com/page")]
    #[case("/relative/path")]
    #[case("javascript:alert(1)")]
    #[case("mailto:test@example.com")]
    #[case("tel:+15551234")]
    #[case("ftp://e.com/file")]
    #[case("data:text/html,hello")]
    #[case("https://")]
    #[case("https://e.com/%22%3E%3Ca%20href")]
    #[case("https://e.com/x%3C/a%3E")]
    #[case("https://e.com/?HREF%3Dfoo")]
    #[case("https://e.com/redirect?to=https://other.com")]
    #[case("http://e.com/http://other.com")]
    #[case("https://e.com/HTTPS://other.com")]
    #[case("https://e.com\"onmouseover/")]
    #[case("https://e'x.com/")]
    fn test_normalize_rejects(#[case] input: &str) {
        assert_eq!(normalize(input), None);
    }

    #[test]
    fn test_length_ceiling() {
        let base = "https://e.com/";
        let at_limit = format!("{base}{}", "a".repeat(MAX_URL_LENGTH - base.len()));
        let over_limit = format!("{at_limit}a");

        assert_eq!(at_limit.chars().count(), MAX_URL_LENGTH);
        assert_eq!(normalize(&at_limit).as_deref(), Some(at_limit.as_str()));
        assert_eq!(normalize(&over_limit), None);
    }

    #[test]
    fn test_fragment_removed_before_length_check() {
        let url = format!("https://e.com/p#{}", "x".repeat(MAX_URL_LENGTH));
        assert_eq!(normalize(&url).as_deref(), Some("https://e.com/p"));
    }

    #[rstest]
    #[case("https://e.com/p/#a")]
    #[case("https://e.com//")]
    #[case("https://e.com/?next=/")]
    #[case("https://e.com/a?x=//")]
    #[case("http://e.com/a/b/c/")]
    fn test_normalize_is_idempotent(#[case] input: &str) {
        let once = normalize(input).unwrap();
        assert_eq!(normalize(&once), Some(once.clone()));
    }

    #[test]
    fn test_percent_escapes_allowed() {
        assert!(is_valid_url("https://e.com/files/my%20doc.pdf"));
        assert!(is_valid_url("https://e.com/a%3Cb"));
    }

    #[test]
    fn test_raw_authority() {
        assert_eq!(raw_authority("https://user@e.com:80/x"), Some("user@e.com:80"));
        assert_eq!(raw_authority("https://e.com?x"), Some("e.com"));
        assert_eq!(raw_authority("e.com/x"), None);
    }
}
