//! Form automation sequencer for the case-status search page.
//!
//! Drives one linear pass: navigate → fill the three form fields → echo the
//! displayed CAPTCHA (or type a caller-supplied token) → submit → wait for
//! the AJAX-driven DataTable → parse. Every expected failure returns a
//! [`ScrapeError`] variant; the browser session is closed on every exit path.
//!
//! The target site validates the CAPTCHA server-side against the hidden
//! `#randomid` value paired with the displayed `#captcha-code` text. The
//! echo-back approach breaks silently if the site ever switches to an image
//! CAPTCHA; that fragility is inherent and deliberately not hardened here.

use crate::browser::{js_string, BrowserSession};
use crate::config::AppConfig;
use crate::error::ScrapeError;
use crate::parse::{parse_case_result, CaseResult};
use anyhow::anyhow;
use tracing::{info, warn};

/// Input parameters for one search.
#[derive(Debug, Clone)]
pub struct CaseQuery {
    pub case_type: String,
    pub case_number: String,
    pub case_year: String,
    /// Manual CAPTCHA override, used verbatim when present.
    pub captcha_token: Option<String>,
}

/// A completed search: the parsed result plus the full page snapshot.
#[derive(Debug, Clone)]
pub struct ScrapedCase {
    pub result: CaseResult,
    pub raw_html: String,
}

/// Phrase the site renders when a required field was left empty.
const VALIDATION_PHRASE: &str = "field is required";

/// Per-field attribution patterns, checked as literal substrings of the
/// rendered page text. Unlikely ever to match dynamically rendered markup;
/// when none match, the phrase is treated as static text and the flow
/// continues.
const VALIDATION_FIELD_PATTERNS: [(&str, &str); 3] = [
    ("case type.*required", "Case Type"),
    ("case number.*required", "Case Number"),
    ("year.*required", "Year"),
];

/// Run one full search in a fresh browser session.
pub async fn run_search(
    config: &AppConfig,
    query: &CaseQuery,
) -> Result<ScrapedCase, ScrapeError> {
    let session = BrowserSession::launch()
        .await
        .map_err(|e| ScrapeError::BrowserInit(format!("{e:#}")))?;

    let outcome = drive(&session, config, query).await;
    session.close().await;
    outcome
}

/// The linear automation script, borrowed session so the caller can always
/// close it afterwards.
async fn drive(
    session: &BrowserSession,
    config: &AppConfig,
    query: &CaseQuery,
) -> Result<ScrapedCase, ScrapeError> {
    let waits = &config.waits;
    let search_url = config.search_url();

    session
        .goto(search_url.as_str(), waits.navigation)
        .await
        .map_err(ScrapeError::Session)?;

    if !session
        .wait_until(&present_js("#case_type"), waits.form_ready)
        .await
    {
        return Err(ScrapeError::FormFill(
            "search form did not load (case_type missing)".into(),
        ));
    }

    fill_form(session, query).await?;
    handle_captcha(session, config, query).await?;
    submit(session).await;

    // A rejection alert pops up shortly after the AJAX validation call.
    if let Some(details) = rejection_alert(session, config).await {
        return Err(captcha_failed(session, details).await);
    }

    // Let in-flight AJAX calls drain, then give the DataTable a moment.
    if session
        .wait_until(
            "typeof jQuery === 'undefined' || jQuery.active === 0",
            waits.ajax_drain,
        )
        .await
    {
        info!("AJAX calls drained, DataTable loaded");
    } else {
        info!("jQuery drain timed out, continuing with current page state");
    }
    session
        .wait_until(&present_js("#caseTable tbody tr"), waits.results_settle)
        .await;

    // Re-check once more: slow validation responses surface the alert late.
    if let Some(details) = rejection_alert(session, config).await {
        return Err(captcha_failed(session, details).await);
    }

    let page_html = session.page_html().await.map_err(ScrapeError::Session)?;
    let page_lower = page_html.to_lowercase();

    if page_lower.contains(VALIDATION_PHRASE) {
        warn!("form validation phrase detected in page source");
        let fields = attribute_validation_fields(&page_lower);
        if fields.is_empty() {
            info!("validation text appears static, continuing");
        } else {
            return Err(ScrapeError::Validation {
                fields,
                raw_snippet: truncate_chars(&page_html, 1000),
            });
        }
    }

    let result = parse_case_result(&page_html, &config.base_url);
    info!(status = result.status.as_str(), "search completed");

    Ok(ScrapedCase {
        result,
        raw_html: page_html,
    })
}

/// Fill the three search fields by exact element id.
async fn fill_form(session: &BrowserSession, query: &CaseQuery) -> Result<(), ScrapeError> {
    select_value(session, "case_type", &query.case_type).await?;
    fill_input(session, "case_number", &query.case_number).await?;
    select_value(session, "case_year", &query.case_year).await?;
    Ok(())
}

/// Read the CAPTCHA widget and type back the answer.
async fn handle_captcha(
    session: &BrowserSession,
    config: &AppConfig,
    query: &CaseQuery,
) -> Result<(), ScrapeError> {
    if !session
        .wait_until(&present_js("#captchaInput"), config.waits.captcha_ready)
        .await
    {
        warn!("CAPTCHA input never appeared");
        return Err(ScrapeError::CaptchaRequired {
            displayed: String::new(),
            validation_key: String::new(),
        });
    }

    let displayed = eval_string(
        session,
        "(document.querySelector('#captcha-code')?.textContent ?? '').trim()",
    )
    .await?;
    let validation_key = eval_string(
        session,
        "document.querySelector('#randomid')?.value ?? ''",
    )
    .await?;
    info!(displayed, "CAPTCHA code displayed on page");

    let answer = match &query.captcha_token {
        Some(token) => {
            info!("using provided CAPTCHA token");
            token.clone()
        }
        None if !displayed.is_empty() && displayed.chars().all(|c| c.is_ascii_digit()) => {
            info!("echoing displayed text CAPTCHA");
            displayed.clone()
        }
        None => {
            warn!("displayed CAPTCHA is not numeric and no token was provided");
            return Err(ScrapeError::CaptchaRequired {
                displayed,
                validation_key,
            });
        }
    };

    fill_input(session, "captchaInput", &answer).await
}

/// Click the search button; fall back to submitting the enclosing form.
/// An unsubmittable form is logged and tolerated; the sequencer proceeds
/// to read whatever the page shows.
async fn submit(session: &BrowserSession) {
    let clicked = matches!(
        session.eval(&click_js("search")).await,
        Ok(v) if v.get("ok").and_then(serde_json::Value::as_bool) == Some(true)
    );
    if clicked {
        info!("search button clicked");
        return;
    }

    let fallback = session
        .eval(
            "(() => { const f = document.querySelector('#case_number')?.form; \
             if (f) { f.requestSubmit(); return { ok: true }; } return { ok: false }; })()",
        )
        .await;
    match fallback {
        Ok(v) if v.get("ok").and_then(serde_json::Value::as_bool) == Some(true) => {
            info!("form submitted via requestSubmit fallback");
        }
        _ => warn!("could not submit form, continuing with filled page"),
    }
}

/// Watch for a visible SweetAlert overlay reporting a CAPTCHA rejection.
async fn rejection_alert(session: &BrowserSession, config: &AppConfig) -> Option<String> {
    let visible = session
        .wait_until(
            "(() => { const el = document.querySelector('.swal2-popup, .swal2-modal'); \
             if (!el) return false; const s = getComputedStyle(el); \
             return s.display !== 'none' && s.visibility !== 'hidden'; })()",
            config.waits.alert_window,
        )
        .await;
    if !visible {
        return None;
    }

    let text = session
        .eval(
            "(document.querySelector('.swal2-popup, .swal2-modal')?.textContent ?? '').trim()",
        )
        .await
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))?;

    if text.to_lowercase().contains("incorrect") {
        warn!(alert = %text, "CAPTCHA rejection alert detected");
        Some(text)
    } else {
        info!(alert = %text, "alert overlay present but not a CAPTCHA rejection");
        None
    }
}

async fn captcha_failed(session: &BrowserSession, details: String) -> ScrapeError {
    let raw_snippet = session
        .page_html()
        .await
        .map(|html| truncate_chars(&html, 1500))
        .unwrap_or_default();
    ScrapeError::CaptchaFailed {
        details,
        raw_snippet,
    }
}

/// Which of the three known fields the validation phrase implicates.
/// Empty when none of the (static, likely-dead) patterns match.
fn attribute_validation_fields(page_lower: &str) -> Vec<String> {
    VALIDATION_FIELD_PATTERNS
        .iter()
        .filter(|(pattern, _)| page_lower.contains(pattern))
        .map(|(_, label)| label.to_string())
        .collect()
}

// ── Page script builders ────────────────────────────────────────

/// Predicate: the selector matches at least one element.
fn present_js(selector: &str) -> String {
    format!(
        "document.querySelector('{}') !== null",
        js_string(selector)
    )
}

/// Exact-match value selection on a `<select>`; fails when the value is not
/// among the options.
fn select_option_js(id: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('#{id}');
            if (!el) return {{ ok: false, reason: '{id} not found' }};
            const match = [...el.options].some(o => o.value === '{value}');
            if (!match) return {{ ok: false, reason: 'no option with value {value} in {id}' }};
            el.value = '{value}';
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true }};
        }})()"#,
        id = js_string(id),
        value = js_string(value),
    )
}

/// Clear and fill a text input, firing an `input` event.
fn fill_input_js(id: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('#{id}');
            if (!el) return {{ ok: false, reason: '{id} not found' }};
            el.value = '';
            el.value = '{value}';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return {{ ok: true }};
        }})()"#,
        id = js_string(id),
        value = js_string(value),
    )
}

fn click_js(id: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector('#{id}');
            if (el) {{ el.click(); return {{ ok: true }}; }}
            return {{ ok: false }};
        }})()"#,
        id = js_string(id),
    )
}

async fn select_value(
    session: &BrowserSession,
    id: &str,
    value: &str,
) -> Result<(), ScrapeError> {
    run_fill_step(session, &select_option_js(id, value), id).await
}

async fn fill_input(
    session: &BrowserSession,
    id: &str,
    value: &str,
) -> Result<(), ScrapeError> {
    run_fill_step(session, &fill_input_js(id, value), id).await
}

async fn run_fill_step(
    session: &BrowserSession,
    script: &str,
    id: &str,
) -> Result<(), ScrapeError> {
    let v = session
        .eval(script)
        .await
        .map_err(|e| ScrapeError::FormFill(format!("{id}: {e:#}")))?;
    if v.get("ok").and_then(serde_json::Value::as_bool) == Some(true) {
        Ok(())
    } else {
        let reason = v
            .get("reason")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("element interaction failed")
            .to_string();
        Err(ScrapeError::FormFill(reason))
    }
}

async fn eval_string(session: &BrowserSession, script: &str) -> Result<String, ScrapeError> {
    let v = session
        .eval(script)
        .await
        .map_err(|e| ScrapeError::Session(anyhow!("{e:#}")))?;
    Ok(v.as_str().unwrap_or_default().to_string())
}

/// Char-boundary-safe prefix, for persisted failure snapshots.
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
