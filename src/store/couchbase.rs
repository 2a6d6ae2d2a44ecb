//! Couchbase [`DocumentStore`] over the query service REST API.
//!
//! Each write is a single SQL++ statement posted to `{url}/query/service`:
//!
//! ```text
//! UPSERT INTO `bucket`.`scope`.`collection` (KEY, VALUE) VALUES ($1, $2)
//! ```
//!
//! with the key and record passed as positional arguments, so record content
//! is never spliced into the statement text.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::DocumentStore;
use crate::config::StoreConfig;

pub struct CouchbaseStore {
    endpoint: String,
    username: String,
    password: String,
    statement: String,
    client: reqwest::Client,
}

impl CouchbaseStore {
    /// Build a client from a validated [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if any of url, username, password, or bucket is unset.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .context("COUCHBASE_URL not set")?;
        let username = config
            .username
            .clone()
            .context("COUCHBASE_USERNAME not set")?;
        let password = config
            .password
            .clone()
            .context("COUCHBASE_PASSWORD not set")?;
        let bucket = config.bucket.as_deref().context("COUCHBASE_BUCKET not set")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: query_endpoint(url),
            username,
            password,
            statement: upsert_statement(bucket, &config.scope, &config.collection),
            client,
        })
    }
}

#[async_trait]
impl DocumentStore for CouchbaseStore {
    fn name(&self) -> &str {
        "couchbase"
    }

    async fn upsert(&self, key: &str, value: &Value) -> Result<()> {
        let body = serde_json::json!({
            "statement": self.statement,
            "args": [key, value],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Couchbase query service unreachable at {}", self.endpoint))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let detail = json
                .as_ref()
                .and_then(first_error_message)
                .unwrap_or(text);
            bail!("Couchbase query error {}: {}", status, detail);
        }

        match json {
            Some(json) => check_query_status(&json),
            None => bail!("Couchbase query service returned non-JSON response"),
        }
    }
}

/// Normalize a cluster URL to the query service endpoint.
fn query_endpoint(url: &str) -> String {
    let base = url.trim_end_matches('/');
    if base.ends_with("/query/service") {
        base.to_string()
    } else {
        format!("{}/query/service", base)
    }
}

fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn upsert_statement(bucket: &str, scope: &str, collection: &str) -> String {
    format!(
        "UPSERT INTO {}.{}.{} (KEY, VALUE) VALUES ($1, $2)",
        escape_identifier(bucket),
        escape_identifier(scope),
        escape_identifier(collection)
    )
}

fn first_error_message(json: &Value) -> Option<String> {
    let err = json.get("errors")?.as_array()?.first()?;
    let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
    let msg = err.get("msg").and_then(Value::as_str).unwrap_or("unknown error");
    Some(format!("[{}] {}", code, msg))
}

fn check_query_status(json: &Value) -> Result<()> {
    match json.get("status").and_then(Value::as_str) {
        Some("success") => Ok(()),
        Some(other) => {
            let detail = first_error_message(json).unwrap_or_default();
            bail!("Couchbase query {}: {}", other, detail)
        }
        None => bail!("Couchbase query response missing status"),
    }
}
