//! Error taxonomy for the scrape flow and the PDF proxy.
//!
//! Expected failures (missing element, CAPTCHA mismatch, bad form value)
//! travel as `ScrapeError` values; hard faults (session crash, protocol
//! breakage) are wrapped in the `Session` variant via anyhow.

use thiserror::Error;

/// Failure modes of a single case search.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The headless browser could not be launched at all.
    #[error("failed to initialize browser driver: {0}")]
    BrowserInit(String),

    /// A form field could not be filled (missing element, unknown
    /// select value). Not validated client-side beyond this.
    #[error("could not fill form: {0}")]
    FormFill(String),

    /// The displayed CAPTCHA is not machine-readable; the caller must
    /// retry with a manual token. Carries the displayed text and the
    /// hidden validation key paired with it on the page.
    #[error("CAPTCHA is required. Please provide the CAPTCHA token manually from the court website.")]
    CaptchaRequired {
        displayed: String,
        validation_key: String,
    },

    /// The site rejected the submitted CAPTCHA code.
    #[error("CAPTCHA verification failed. The CAPTCHA code was incorrect.")]
    CaptchaFailed {
        /// Text of the alert overlay that reported the rejection.
        details: String,
        /// Truncated page snapshot at the time of failure.
        raw_snippet: String,
    },

    /// The site reported a missing required field after submission.
    #[error("form validation failed: missing fields: {}", fields.join(", "))]
    Validation {
        fields: Vec<String>,
        raw_snippet: String,
    },

    /// Anything unexpected: navigation failure, evaluate fault, crash.
    #[error(transparent)]
    Session(#[from] anyhow::Error),
}

impl ScrapeError {
    /// Status label persisted with the query record and returned in the
    /// JSON body. Matches the terminal-outcome vocabulary of the flow.
    pub fn status_label(&self) -> &'static str {
        match self {
            ScrapeError::CaptchaRequired { .. } => "CAPTCHA Required",
            ScrapeError::CaptchaFailed { .. } => "CAPTCHA Failed",
            ScrapeError::Validation { .. } => "Validation Error",
            ScrapeError::BrowserInit(_) | ScrapeError::FormFill(_) | ScrapeError::Session(_) => {
                "Error"
            }
        }
    }

    /// Page snapshot to persist alongside the failure, if any was taken.
    pub fn raw_snippet(&self) -> &str {
        match self {
            ScrapeError::CaptchaFailed { raw_snippet, .. }
            | ScrapeError::Validation { raw_snippet, .. } => raw_snippet,
            _ => "",
        }
    }
}

/// Failure modes of the PDF proxy endpoint.
#[derive(Debug, Error)]
pub enum PdfFetchError {
    #[error("PDF URL not provided")]
    MissingUrl,

    #[error("Failed to download PDF")]
    UpstreamStatus(u16),

    #[error("Failed to download PDF: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        let e = ScrapeError::CaptchaRequired {
            displayed: "1234".into(),
            validation_key: "abcd".into(),
        };
        assert_eq!(e.status_label(), "CAPTCHA Required");

        let e = ScrapeError::CaptchaFailed {
            details: "CAPTCHA is incorrect".into(),
            raw_snippet: String::new(),
        };
        assert_eq!(e.status_label(), "CAPTCHA Failed");

        let e = ScrapeError::Validation {
            fields: vec!["Case Type".into()],
            raw_snippet: String::new(),
        };
        assert_eq!(e.status_label(), "Validation Error");

        assert_eq!(
            ScrapeError::BrowserInit("no chromium".into()).status_label(),
            "Error"
        );
        assert_eq!(
            ScrapeError::FormFill("no such option".into()).status_label(),
            "Error"
        );
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let e = ScrapeError::Validation {
            fields: vec!["Case Number".into(), "Year".into()],
            raw_snippet: String::new(),
        };
        assert!(e.to_string().contains("Case Number, Year"));
    }
}
