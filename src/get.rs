//! Record lookup by key.
//!
//! Backs `csync get <key>`: reads one record back from the local SQLite
//! store so a sync can be checked without a database client. Only the SQLite
//! backend supports reads; the pipeline itself never reads.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::store::SqliteStore;

/// Fetch the record stored at `key`.
pub async fn get_record(config: &StoreConfig, key: &str) -> Result<Value> {
    if config.backend != "sqlite" {
        bail!(
            "get is only supported for the sqlite store (configured: {})",
            config.backend
        );
    }
    if !config.path.exists() {
        bail!(
            "database not found: {} (run `csync init` or `csync sync` first)",
            config.path.display()
        );
    }

    let store = SqliteStore::open(&config.path).await?;
    let record = store.get(key).await;
    store.close().await;

    match record? {
        Some(value) => Ok(value),
        None => bail!("record not found: {}", key),
    }
}

/// CLI entry point: pretty-print the record as JSON on stdout.
pub async fn run_get(config: &StoreConfig, key: &str) -> Result<()> {
    let value = get_record(config, key).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
