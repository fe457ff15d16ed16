//! HTTP API request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linkharvest_core::{BrowserConfig, ExtractionConfig, LinkExtractor, extract_with_browser};
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use crate::types::{Endpoints, ErrorResponse, ExtractRequest, ExtractResponse, HealthResponse, ServiceInfo};

const SERVICE_NAME: &str = "Link Extractor API";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<LinkExtractor>,
}

/// Service description
pub async fn root() -> impl IntoResponse {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            extract: "POST - Extract links from a URL",
            health: "GET - Health check",
        },
    })
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy", service: SERVICE_NAME })
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

/// Human-readable cause of a failed extraction task.
fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "extraction task panicked".to_string()
    }
}

/// Extract endpoint
///
/// Soft failures answer 400 with the partial diagnostics; a panic inside the
/// extraction task answers 500.
pub async fn extract(State(state): State<AppState>, payload: Result<Json<ExtractRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "rejected extract request body");
            return bad_request(rejection.body_text());
        }
    };

    let url = match request.url {
        Some(url) if !url.is_empty() => url,
        _ => return bad_request("URL is required"),
    };
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return bad_request("Invalid URL format. URL must start with http:// or https://");
    }

    let config = ExtractionConfig::builder()
        .filter_domain(request.filter_domain)
        .include_external(request.include_external)
        .timeout(request.timeout)
        .build();

    debug!(url, use_browser = request.use_browser, scope = ?config.scope(), "HTTP extract request");

    let task = if request.use_browser {
        let browser_config = BrowserConfig::for_timeouts(request.timeout, request.wait_time);
        tokio::spawn(async move { extract_with_browser(&url, &config, &browser_config).await })
    } else {
        let extractor = Arc::clone(&state.extractor);
        tokio::spawn(async move { extractor.extract(&url, &config).await })
    };

    match task.await {
        Ok(extraction) => {
            let (links, diagnostics) = extraction.into_sorted();
            let status = if diagnostics.is_failure() { StatusCode::BAD_REQUEST } else { StatusCode::OK };
            if let Some(reason) = &diagnostics.error {
                warn!(error = %reason, "extraction failed");
            }
            (status, Json(ExtractResponse::new(links, diagnostics))).into_response()
        }
        Err(err) => {
            let traceback = format!("{err:?}");
            let message = panic_message(err);
            error!(error = %message, "extraction task aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_traceback(message, traceback)),
            )
                .into_response()
        }
    }
}
