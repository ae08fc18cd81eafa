//! Live CAPTCHA probe — navigates to the search page and reports what the
//! CAPTCHA widget displays, without submitting anything. Useful when the
//! echo-back flow starts failing and the site may have changed its mechanism.

use crate::browser::BrowserSession;
use crate::config::AppConfig;
use anyhow::{bail, Result};

pub async fn run(config: AppConfig) -> Result<()> {
    let session = BrowserSession::launch().await?;
    let outcome = probe(&session, &config).await;
    session.close().await;
    outcome
}

async fn probe(session: &BrowserSession, config: &AppConfig) -> Result<()> {
    let url = config.search_url();
    println!("  navigating to {url}");
    session.goto(url.as_str(), config.waits.navigation).await?;

    if !session
        .wait_until(
            "document.querySelector('#captchaInput') !== null",
            config.waits.captcha_ready,
        )
        .await
    {
        bail!("CAPTCHA widget did not load within the wait ceiling");
    }

    let displayed = eval_str(
        session,
        "(document.querySelector('#captcha-code')?.textContent ?? '').trim()",
    )
    .await?;
    let validation_key = eval_str(
        session,
        "document.querySelector('#randomid')?.value ?? ''",
    )
    .await?;
    let image_src = eval_str(
        session,
        "document.querySelector('#captcha-image')?.src ?? ''",
    )
    .await?;

    println!("  displayed code:  {displayed:?}");
    println!("  validation key:  {validation_key:?}");
    println!("  code == key:     {}", displayed == validation_key);
    println!(
        "  numeric:         {}",
        !displayed.is_empty() && displayed.chars().all(|c| c.is_ascii_digit())
    );
    if image_src.is_empty() {
        println!("  image CAPTCHA:   none");
    } else {
        println!("  image CAPTCHA:   {image_src}");
    }

    let rows = session
        .eval("document.querySelectorAll('#caseTable tbody tr').length")
        .await?
        .as_u64()
        .unwrap_or(0);
    println!("  result rows:     {rows}");

    Ok(())
}

async fn eval_str(session: &BrowserSession, script: &str) -> Result<String> {
    Ok(session
        .eval(script)
        .await?
        .as_str()
        .unwrap_or_default()
        .to_string())
}
