//! SQLite-backed [`DocumentStore`].
//!
//! Records live in a single `documents` table keyed by document key. The
//! record is stored as JSON text; `kind` mirrors its `type` field so records
//! can be filtered without parsing.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::DocumentStore;
use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Fetch the record stored at `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value_json FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let text: String = row.get("value_json");
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => Ok(None),
        }
    }

    /// Number of stored records, optionally restricted to one `type`.
    pub async fn count(&self, kind: Option<&str>) -> Result<i64> {
        let n: i64 = match kind {
            Some(kind) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE kind = ?")
                    .bind(kind)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM documents")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(n)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, key: &str, value: &Value) -> Result<()> {
        let kind = value.get("type").and_then(Value::as_str);
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (key, kind, value_json, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                value_json = excluded.value_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(kind)
        .bind(serde_json::to_string(value)?)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn upsert_overwrites_and_get_reads_back() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("nested/db.sqlite"))
            .await
            .unwrap();

        store
            .upsert("blog_a_1", &json!({ "type": "blogPost", "title": "A", "extra": true }))
            .await
            .unwrap();
        store
            .upsert("blog_a_1", &json!({ "type": "blogPost", "title": "A2" }))
            .await
            .unwrap();

        let got = store.get("blog_a_1").await.unwrap().unwrap();
        assert_eq!(got, json!({ "type": "blogPost", "title": "A2" }));
        assert_eq!(store.count(None).await.unwrap(), 1);
        assert_eq!(store.count(Some("blogPost")).await.unwrap(), 1);
        assert!(store.get("missing").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn reopen_keeps_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sqlite");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert("k", &json!({ "type": "embedding" })).await.unwrap();
            store.close().await;
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.count(Some("embedding")).await.unwrap(), 1);
        store.close().await;
    }
}
