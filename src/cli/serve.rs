//! Start the HTTP server.

use crate::config::AppConfig;
use crate::rest::{self, AppState};
use crate::store::QueryStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: AppConfig) -> Result<()> {
    let store = QueryStore::open(&config.database_path)?;
    info!(
        "starting courtfetch v{}, query log at {}",
        env!("CARGO_PKG_VERSION"),
        config.database_path.display()
    );

    let state = Arc::new(AppState::new(config, store));
    rest::start(state).await
}
