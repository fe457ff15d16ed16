//! HTTP API request/response types.

use linkharvest_core::Diagnostics;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/extract`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    /// Page to extract from; must be present and start with `http://` or `https://`
    #[serde(default)]
    pub url: Option<String>,
    /// Render the page in a headless browser first (default: false)
    #[serde(default)]
    pub use_browser: bool,
    /// Request same-domain filtering (default: false)
    #[serde(default)]
    pub filter_domain: bool,
    /// Keep links to other hosts (default: true)
    #[serde(default = "default_include_external")]
    pub include_external: bool,
    /// Fetch timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Seconds to wait for browser-rendered links to settle (default: 15)
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
}

fn default_include_external() -> bool {
    true
}

fn default_timeout() -> u64 {
    10
}

fn default_wait_time() -> u64 {
    15
}

/// Result of an extraction, successful or soft-failed.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sorted links
    pub links: Vec<String>,
    pub count: usize,
    pub diagnostics: Diagnostics,
}

impl ExtractResponse {
    pub fn new(links: Vec<String>, diagnostics: Diagnostics) -> Self {
        Self {
            success: diagnostics.error.is_none(),
            error: diagnostics.error.clone(),
            count: links.len(),
            links,
            diagnostics,
        }
    }
}

/// Error body for rejected requests and unexpected faults.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into(), traceback: None }
    }

    pub fn with_traceback(error: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self { success: false, error: error.into(), traceback: Some(traceback.into()) }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Service description served at `/`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize)]
pub struct Endpoints {
    #[serde(rename = "/api/extract")]
    pub extract: &'static str,
    #[serde(rename = "/api/health")]
    pub health: &'static str,
}
