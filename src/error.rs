//! Error taxonomy for the sync pipeline.
//!
//! [`SyncError::Discovery`] and [`SyncError::Config`] are batch-fatal. Every
//! other variant is scoped to a single document and is recorded in the
//! [`SyncReport`](crate::report::SyncReport) instead of aborting the run.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("invalid post: {0}")]
    Validation(String),

    #[error("upsert failed: {0}")]
    Upsert(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("relocation failed: {0}")]
    Relocation(String),
}

impl SyncError {
    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Discovery(m)
            | Self::Config(m)
            | Self::Read(m)
            | Self::Parse(m)
            | Self::Validation(m)
            | Self::Upsert(m)
            | Self::Embedding(m)
            | Self::Relocation(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Read,
    Parse,
    Validation,
    Upsert,
    Embedding,
    Relocation,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Parse => "parse",
            Self::Validation => "validation",
            Self::Upsert => "upsert",
            Self::Embedding => "embedding",
            Self::Relocation => "relocation",
        }
    }
}
