//! Storage abstraction for content-sync.
//!
//! The [`DocumentStore`] trait is the only capability the pipeline needs from
//! a database: overwrite the record at a key. There is no read-modify-write
//! and no transaction spanning keys, so every write is independently
//! idempotent and a rerun converges on the same state.
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | `sqlite` | [`SqliteStore`] | Local database file |
//! | `couchbase` | [`CouchbaseStore`] | Remote bucket via the query service |
//! | `memory` | [`InMemoryStore`] | Tests and `--dry-run` only |

pub mod couchbase;
pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::StoreConfig;

pub use couchbase::CouchbaseStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract key/value document store with replace-on-write semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend label used in logs and the summary.
    fn name(&self) -> &str;

    /// Insert `value` at `key`, replacing any existing record entirely.
    async fn upsert(&self, key: &str, value: &Value) -> Result<()>;
}

/// Open the store selected by `config.backend`.
pub async fn create_store(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Box::new(InMemoryStore::new())),
        "sqlite" => Ok(Box::new(SqliteStore::open(&config.path).await?)),
        "couchbase" => Ok(Box::new(CouchbaseStore::new(config)?)),
        other => bail!("Unknown store backend: {}", other),
    }
}
