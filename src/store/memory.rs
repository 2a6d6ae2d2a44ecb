//! In-memory [`DocumentStore`] implementation for testing.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::DocumentStore;

/// In-memory store for tests and throwaway runs.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Value>>,
    writes: RwLock<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            writes: RwLock::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.docs.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.docs.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total upserts accepted, including overwrites.
    pub fn write_count(&self) -> u64 {
        *self.writes.read().unwrap()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, key: &str, value: &Value) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(key.to_string(), value.clone());
        *self.writes.write().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_replaces_whole_record() {
        let store = InMemoryStore::new();
        store
            .upsert("k", &json!({ "a": 1, "b": 2 }))
            .await
            .unwrap();
        store.upsert("k", &json!({ "a": 3 })).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get("k"), Some(json!({ "a": 3 })));
    }
}
