//! Application configuration.
//!
//! Built once at startup from `COURTFETCH_*` environment variables plus CLI
//! overrides, then passed down explicitly — no ambient globals.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default site base; the search form lives under `/app/get-case-type-status`.
pub const DEFAULT_BASE_URL: &str = "https://delhihighcourt.nic.in";

/// Path of the search form relative to the base.
pub const SEARCH_PATH: &str = "/app/get-case-type-status";

/// Bounded-wait ceilings for the automation sequencer.
///
/// These replace the original flow's fixed sleeps: each wait point polls its
/// condition with backoff up to the ceiling, then either fails or continues
/// best-effort, preserving the observable timing envelope.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Ceiling for the search form to appear after navigation.
    pub form_ready: Duration,
    /// Ceiling for the CAPTCHA widget to load.
    pub captcha_ready: Duration,
    /// Window after submission in which a rejection alert may pop up.
    pub alert_window: Duration,
    /// Ceiling for in-flight AJAX calls to drain (`jQuery.active == 0`).
    pub ajax_drain: Duration,
    /// Best-effort settle for the results table to fill in.
    pub results_settle: Duration,
    /// Navigation timeout.
    pub navigation: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            form_ready: Duration::from_secs(8),
            captcha_ready: Duration::from_secs(10),
            alert_window: Duration::from_millis(1500),
            ajax_drain: Duration::from_secs(8),
            results_settle: Duration::from_secs(3),
            navigation: Duration::from_secs(30),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
    /// SQLite file holding the query log.
    pub database_path: PathBuf,
    /// Base origin of the court website.
    pub base_url: Url,
    /// Wait ceilings for the sequencer.
    pub waits: WaitConfig,
}

impl AppConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `COURTFETCH_HOST`, `COURTFETCH_PORT`,
    /// `COURTFETCH_DB`, `COURTFETCH_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("COURTFETCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("COURTFETCH_PORT") {
            Ok(p) => p
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid COURTFETCH_PORT: {p}"))?,
            Err(_) => 5000,
        };
        let database_path = std::env::var("COURTFETCH_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("db/queries.db"));
        let base = std::env::var("COURTFETCH_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base).with_context(|| format!("invalid base URL: {base}"))?;

        Ok(Self {
            host,
            port,
            database_path,
            base_url,
            waits: WaitConfig::default(),
        })
    }

    /// Full URL of the case-status search form.
    pub fn search_url(&self) -> Url {
        // The base is validated at construction; joining a constant path
        // cannot fail.
        self.base_url
            .join(SEARCH_PATH)
            .unwrap_or_else(|_| self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_joins_base() {
        let cfg = AppConfig {
            host: "127.0.0.1".into(),
            port: 5000,
            database_path: PathBuf::from("db/queries.db"),
            base_url: Url::parse("https://delhihighcourt.nic.in").unwrap(),
            waits: WaitConfig::default(),
        };
        assert_eq!(
            cfg.search_url().as_str(),
            "https://delhihighcourt.nic.in/app/get-case-type-status"
        );
    }

    #[test]
    fn test_wait_defaults_bounded() {
        let waits = WaitConfig::default();
        assert!(waits.alert_window < waits.form_ready);
        assert!(waits.ajax_drain <= Duration::from_secs(8));
    }
}
