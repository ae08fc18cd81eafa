// Copyright 2026 Courtfetch Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP API for courtfetch.
//!
//! Thin boundary over the sequencer and the query store: every failure is
//! converted to a JSON error body here, nothing propagates as a raw fault.

use crate::config::AppConfig;
use crate::error::PdfFetchError;
use crate::parse::CaseStatus;
use crate::scrape::{run_search, CaseQuery, ScrapedCase};
use crate::store::{QueryRecord, QueryStore};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Hint attached to a completed search that located no case row.
const NOT_FOUND_HINT: &str = "No case found with the provided details. This could be due to: \
     1) Case doesn't exist in court records, 2) CAPTCHA validation failed, \
     3) Case is in different category";

/// Shared state handed to every handler. Constructed once at startup and
/// passed down explicitly — no ambient globals.
pub struct AppState {
    pub config: AppConfig,
    pub store: QueryStore,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, store: QueryStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                 AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/131.0.0.0 Safari/537.36",
            )
            .build()
            .unwrap_or_default();
        Self {
            config,
            store,
            http,
        }
    }
}

/// Wrapper to assert a future is Send.
///
/// The search future contains only Send types, but the compiler cannot
/// prove it due to higher-ranked lifetime bounds in transitive dependencies
/// (scraper, chromiumoxide).
struct AssertSend<F>(F);

// SAFETY: the wrapped future holds only Arc/String/serde_json values and
// chromiumoxide handles, all of which are Send; the parsed HTML document
// never lives across an await point.
unsafe impl<F: std::future::Future> Send for AssertSend<F> {}

impl<F: std::future::Future> std::future::Future for AssertSend<F> {
    type Output = F::Output;
    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        // SAFETY: plain pin projection of the single field.
        let inner = unsafe { self.map_unchecked_mut(|s| &mut s.0) };
        inner.poll(cx)
    }
}

/// Build the axum router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/search", post(search))
        .route("/download_pdf", get(download_pdf))
        .route("/history", get(history))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn start(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    info!("courtfetch listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

/// Serve the embedded search form page.
async fn index() -> impl IntoResponse {
    Html(include_str!("index.html"))
}

#[derive(Deserialize, Default)]
struct SearchForm {
    case_type: Option<String>,
    case_number: Option<String>,
    case_year: Option<String>,
    captcha_token: Option<String>,
}

/// Run one case search end to end: validate input, drive the browser,
/// persist the query record exactly once, return the outcome as JSON.
async fn search(State(state): State<Arc<AppState>>, Form(form): Form<SearchForm>) -> Response {
    let case_type = form.case_type.unwrap_or_default().trim().to_string();
    let case_number = form.case_number.unwrap_or_default().trim().to_string();
    let case_year = form.case_year.unwrap_or_default().trim().to_string();
    let captcha_token = form
        .captcha_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if case_type.is_empty() || case_number.is_empty() || case_year.is_empty() {
        warn!("search rejected: missing required fields");
        return Json(json!({ "error": "All fields are required" })).into_response();
    }

    info!(%case_type, %case_number, %case_year, "search request");

    let query = CaseQuery {
        case_type: case_type.clone(),
        case_number: case_number.clone(),
        case_year: case_year.clone(),
        captcha_token,
    };
    let config = state.config.clone();

    // Spawned so the handler future axum sees is trivially Send.
    let outcome = {
        let fut = AssertSend(async move { run_search(&config, &query).await });
        match tokio::task::spawn(fut).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("search task panicked: {e}");
                return server_error(&format!("Server error: {e}"));
            }
        }
    };

    let (body, record) = match &outcome {
        Ok(scraped) => completed_response(scraped, &case_type, &case_number, &case_year),
        Err(e) => {
            let mut body = json!({
                "error": e.to_string(),
                "status": e.status_label(),
            });
            if let crate::error::ScrapeError::CaptchaRequired {
                displayed,
                validation_key,
            } = e
            {
                body["displayed_captcha"] = json!(displayed);
                body["randomid"] = json!(validation_key);
            }
            if let crate::error::ScrapeError::CaptchaFailed { details, .. } = e {
                body["details"] = json!(details);
            }

            let record = QueryRecord {
                case_type: case_type.clone(),
                case_number: case_number.clone(),
                case_year: case_year.clone(),
                queried_at: Utc::now(),
                raw_response: e.raw_snippet().to_string(),
                parties: String::new(),
                filing_date: String::new(),
                next_hearing_date: String::new(),
                order_judgment_link: String::new(),
                status: e.status_label().to_string(),
            };
            (body, record)
        }
    };

    let status_label = record.status.clone();
    let store = state.store.clone();
    let persisted = tokio::task::spawn_blocking(move || store.record(&record)).await;
    match persisted {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            error!("failed to persist query record: {e:#}");
            return server_error(&format!("Server error: {e}"));
        }
        Err(e) => {
            error!("persist task panicked: {e}");
            return server_error(&format!("Server error: {e}"));
        }
    }

    info!(status = %status_label, "search completed");
    Json(body).into_response()
}

/// Response body and query record for a search that ran to completion.
fn completed_response(
    scraped: &ScrapedCase,
    case_type: &str,
    case_number: &str,
    case_year: &str,
) -> (Value, QueryRecord) {
    let result = &scraped.result;
    let mut body = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    body["case_type"] = json!(case_type);
    body["case_number"] = json!(case_number);
    body["case_year"] = json!(case_year);
    if result.status == CaseStatus::NotFound {
        body["error"] = json!(NOT_FOUND_HINT);
    }

    let record = QueryRecord {
        case_type: case_type.to_string(),
        case_number: case_number.to_string(),
        case_year: case_year.to_string(),
        queried_at: Utc::now(),
        raw_response: scraped.raw_html.clone(),
        parties: result.parties.clone(),
        filing_date: result.filing_date.clone(),
        next_hearing_date: result.next_hearing_date.clone(),
        order_judgment_link: result.order_judgment_link.clone(),
        status: result.status.as_str().to_string(),
    };
    (body, record)
}

#[derive(Deserialize, Default)]
struct DownloadParams {
    url: Option<String>,
}

/// Fetch and relay a PDF from a caller-supplied URL.
///
/// No allow-list or domain restriction is applied — the proxy will fetch
/// arbitrary remote content. Open concern, documented not resolved.
async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Response {
    match fetch_pdf(&state.http, params.url.as_deref()).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/pdf"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"court_order.pdf\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!("pdf fetch failed: {e}");
            Json(json!({ "error": e.to_string() })).into_response()
        }
    }
}

/// Single-shot fetch — no retries; every failure is terminal.
async fn fetch_pdf(
    client: &reqwest::Client,
    url: Option<&str>,
) -> Result<Bytes, PdfFetchError> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(PdfFetchError::MissingUrl)?;

    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(PdfFetchError::UpstreamStatus(resp.status().as_u16()));
    }
    Ok(resp.bytes().await?)
}

/// The 50 most recent query records, newest first.
async fn history(State(state): State<Arc<AppState>>) -> Response {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.recent(50)).await {
        Ok(Ok(entries)) => Json(entries).into_response(),
        Ok(Err(e)) => {
            error!("history query failed: {e:#}");
            server_error("Internal server error")
        }
        Err(e) => {
            error!("history task panicked: {e}");
            server_error("Internal server error")
        }
    }
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
        .into_response()
}

fn server_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
