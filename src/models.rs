//! Core data models used throughout content-sync.
//!
//! A [`Post`] is the in-memory form of one Markdown file. It is never stored
//! directly; only its projections ([`DocumentRecord`], [`EmbeddingRecord`])
//! reach the store.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Discriminator written to every document record.
pub const BLOG_POST_TYPE: &str = "blogPost";

/// Discriminator written to every embedding record.
pub const EMBEDDING_TYPE: &str = "embedding";

/// One parsed source document: frontmatter metadata plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub metadata: Map<String, Value>,
    pub body: String,
}

impl Post {
    /// Returns a metadata field as a string, if present and a string.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.field_str("title")
    }

    pub fn date(&self) -> Option<&str> {
        self.field_str("date")
    }
}

/// Where a candidate file was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// Listed from a drafts directory; relocated after a successful upsert.
    Directory,
    /// Reported by a change-list provider; never relocated.
    ChangeList,
}

/// A file the orchestrator will attempt to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Path used for reading (absolute or relative to the working directory).
    pub path: PathBuf,
    /// Path as listed by discovery, used in logs and the summary.
    pub display: String,
    pub origin: CandidateOrigin,
}

/// Persisted form of a [`Post`]: every metadata field, the body under
/// `content`, and `type = "blogPost"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord(Map<String, Value>);

impl DocumentRecord {
    pub fn from_post(post: &Post) -> Self {
        let mut fields = post.metadata.clone();
        fields.insert("content".to_string(), Value::String(post.body.clone()));
        fields.insert(
            "type".to_string(),
            Value::String(BLOG_POST_TYPE.to_string()),
        );
        Self(fields)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Persisted embedding vector for one document, stored at `embedding::<id>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "postId")]
    pub post_id: String,
    pub model: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(post_id: &str, model: &str, vector: Vec<f32>) -> Self {
        Self {
            kind: EMBEDDING_TYPE,
            post_id: post_id.to_string(),
            model: model.to_string(),
            vector,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.kind,
            "postId": self.post_id,
            "model": self.model,
            "vector": self.vector,
        })
    }
}
