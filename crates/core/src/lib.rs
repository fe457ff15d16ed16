pub mod browser;
pub mod diagnostics;
pub mod discover;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod filter;
pub mod normalize;
pub mod parse;

#[cfg(feature = "browser")]
pub use browser::ChromiumSession;
pub use browser::{BrowserConfig, PageSession, Stabilization, extract_with_browser, extract_with_session};
pub use diagnostics::{Diagnostics, ExtractionMethod};
pub use discover::{CandidateLink, Discovery, LinkSource};
pub use error::{BrowserError, FetchError, LinkHarvestError, ParseFailure, Result};
pub use extractor::{Extraction, ExtractionConfig, ExtractionConfigBuilder, LinkExtractor, LinkSet};
pub use fetch::{FetchResult, Fetcher, FetcherConfig, fetch_file, fetch_stdin};
pub use filter::{DomainScope, is_same_origin};
pub use normalize::{is_valid_url, normalize};
pub use parse::{Document, ParserChain};
