//! Per-call diagnostics record.
//!
//! Every extraction returns a [`Diagnostics`] alongside its links, on success
//! and on soft failure alike. Fields are filled in as the pipeline advances, so
//! a caller can tell a blocked fetch (status code, `error`) from an empty page
//! (zero `anchor_tags_found`) from a script-rendered one (tiny body, no anchors).

use serde::{Deserialize, Serialize};

/// Which code path produced the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Plain HTTP GET.
    Http,
    /// Markup rendered by a headless browser.
    BrowserAutomation,
    /// Markup supplied directly by the caller (file, stdin).
    Local,
}

/// Structured diagnostics for one extraction call.
///
/// Absent fields are omitted from the JSON form; `success` is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Body size in bytes as received (after transfer decoding).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// URL after redirects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirected: Option<bool>,

    /// Number of `<a href>` elements in the parsed markup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_tags_found: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_links_found: Option<usize>,

    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ExtractionMethod>,

    /// Name of the parser strategy that accepted the body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_load_warning: Option<String>,
}

impl Diagnostics {
    /// Creates an empty record tagged with the extraction method.
    pub fn for_method(method: ExtractionMethod) -> Self {
        Self { method: Some(method), ..Default::default() }
    }

    /// Marks the call as a soft failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.success = false;
    }

    /// Marks the call as successful with `unique` surviving links.
    pub fn succeed(&mut self, unique: usize) {
        self.unique_links_found = Some(unique);
        self.success = true;
    }

    /// True when an error has been recorded.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
