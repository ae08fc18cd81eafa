//! Check environment and diagnose issues before serving.

use crate::browser::find_chromium;
use crate::config::AppConfig;
use crate::store::QueryStore;
use anyhow::Result;
use std::time::Duration;

pub async fn run(config: AppConfig) -> Result<()> {
    let mut problems = 0u32;

    match find_chromium() {
        Some(path) => println!("  ok  Chromium: {}", path.display()),
        None => {
            println!(
                "  !!  Chromium not found. Install Chrome/Chromium or set \
                 COURTFETCH_CHROMIUM_PATH."
            );
            problems += 1;
        }
    }

    match QueryStore::open(&config.database_path) {
        Ok(store) => {
            let count = store.recent(50).map(|h| h.len()).unwrap_or(0);
            println!(
                "  ok  Database: {} ({count} recent queries)",
                config.database_path.display()
            );
        }
        Err(e) => {
            println!("  !!  Database: {e:#}");
            problems += 1;
        }
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default();
    match client.get(config.base_url.as_str()).send().await {
        Ok(resp) => println!(
            "  ok  Target site {} reachable (HTTP {})",
            config.base_url,
            resp.status().as_u16()
        ),
        Err(e) => {
            println!("  !!  Target site {} unreachable: {e}", config.base_url);
            problems += 1;
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
    }
    println!("  all checks passed");
    Ok(())
}
