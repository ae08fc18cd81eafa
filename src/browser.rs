//! Headless Chromium session management via chromiumoxide.
//!
//! One isolated browser process per search request — no pooling, no reuse.
//! Launched with anti-automation-detection flags; the standard
//! `navigator.webdriver` giveaway is removed by a post-launch script.

use anyhow::{bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;

/// Script that hides the automation marker Selenium-era detectors look for.
const STEALTH_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. COURTFETCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("COURTFETCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.courtfetch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".courtfetch/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".courtfetch/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".courtfetch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".courtfetch/chromium/chrome-linux64/chrome"),
                home.join(".courtfetch/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Build the launch config with the fixed anti-detection flag set.
fn session_config(executable: Option<PathBuf>) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .arg("--headless=new")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--window-size=1920,1080")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-extensions")
        .arg("--disable-background-networking");

    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))
}

/// A single headless browser process with one page.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a fresh headless Chromium and open a blank page.
    ///
    /// Tries the discovered binary first; if that launch fails, retries once
    /// with chromiumoxide's own auto-detected default before giving up.
    pub async fn launch() -> Result<Self> {
        let (browser, mut handler) = match find_chromium() {
            Some(path) => match Browser::launch(session_config(Some(path.clone())).context("invalid browser config")?).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(
                        "launch with {} failed ({e}), falling back to system default",
                        path.display()
                    );
                    Browser::launch(session_config(None)?)
                        .await
                        .context("failed to launch Chromium")?
                }
            },
            None => Browser::launch(session_config(None)?)
                .await
                .context("failed to launch Chromium")?,
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        // Post-launch automation-marker removal.
        let _ = page.evaluate(STEALTH_JS).await;

        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Navigate to a URL with a timeout, then wait for the load to finish.
    pub async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let result = tokio::time::timeout(timeout, self.page.goto(url)).await;
        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }
    }

    /// Execute JavaScript in the page context and return the result.
    pub async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    /// Poll a boolean JS predicate until it holds or the ceiling elapses.
    ///
    /// Backs off exponentially from 100ms up to 800ms between probes.
    /// Evaluate errors count as "not yet". Returns whether the condition
    /// was observed within the window.
    pub async fn wait_until(&self, predicate: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut interval = Duration::from_millis(100);

        loop {
            if let Ok(v) = self.eval(predicate).await {
                if v.as_bool() == Some(true) {
                    return true;
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(Duration::from_millis(800));
        }
    }

    /// Get the full rendered page HTML.
    pub async fn page_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    /// Close the page and shut the browser process down.
    pub async fn close(mut self) {
        let _ = self.page.close().await;
        let _ = self.browser.close().await;
        self.handler_task.abort();
    }
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes everything that could break out of the string context: quotes,
/// backslashes, backticks, newlines, and angle brackets (so a reflected
/// value cannot smuggle a `</script>`). Null bytes are stripped.
pub fn js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_basic() {
        assert_eq!(js_string("W.P.(C)"), "W.P.(C)");
        assert_eq!(js_string("it's"), "it\\'s");
        assert_eq!(js_string("a\"b"), "a\\\"b");
    }

    #[test]
    fn test_js_string_script_breakout() {
        let hostile = r#"</script><script>alert(1)</script>"#;
        let sanitized = js_string(hostile);
        assert!(!sanitized.contains("</script>"));
        assert!(sanitized.contains("\\x3c/script\\x3e"));
    }

    #[test]
    fn test_js_string_null_bytes_stripped() {
        assert_eq!(js_string("ab\0cd"), "abcd");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_session_navigate_and_eval() {
        let session = BrowserSession::launch().await.expect("launch failed");

        session
            .goto(
                "data:text/html,<h1>Hello</h1><p>World</p>",
                Duration::from_secs(10),
            )
            .await
            .expect("navigation failed");

        let result = session
            .eval("document.querySelector('h1').textContent")
            .await
            .expect("eval failed");
        assert_eq!(result.as_str().unwrap(), "Hello");

        let html = session.page_html().await.expect("page_html failed");
        assert!(html.contains("<h1>Hello</h1>"));

        assert!(
            session
                .wait_until("document.querySelector('p') !== null", Duration::from_secs(2))
                .await
        );
        assert!(
            !session
                .wait_until(
                    "document.querySelector('#missing') !== null",
                    Duration::from_millis(300)
                )
                .await
        );

        session.close().await;
    }
}
