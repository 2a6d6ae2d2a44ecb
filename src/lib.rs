//! # content-sync
//!
//! Imports Markdown posts with YAML frontmatter into a document store.
//!
//! Each post becomes one record keyed by a deterministic id derived from its
//! title and date, so reruns overwrite rather than duplicate. An embedding of
//! the body can be stored alongside it. Drafts are moved to a published
//! directory once imported, or, in CI, the files changed by a pull request are
//! imported in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌────────────┐
//! │ FileSource  │──▶│       Pipeline        │──▶│   Store    │
//! │ dir / PR    │   │ parse → id → upsert   │   │ SQLite /   │
//! └─────────────┘   │ → embed → relocate    │   │ Couchbase  │
//!                   └──────────┬───────────┘   └────────────┘
//!                              ▼
//!                        ┌───────────┐
//!                        │ SyncReport│
//!                        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! csync init                         # create the SQLite schema
//! csync sync                         # import ./drafts, move to ./published
//! csync sync --strategy changes      # import files changed in this PR
//! csync get blog_hello-world_1705276800000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Post, candidate, and record types |
//! | [`frontmatter`] | Frontmatter parsing |
//! | [`identity`] | Document id derivation |
//! | [`budget`] | Token budgeting for embedding input |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Document store abstraction |
//! | [`changes`] | Pull-request change lists |
//! | [`discovery`] | Candidate file discovery |
//! | [`ingest`] | The import pipeline |
//! | [`report`] | Batch summary |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod budget;
pub mod changes;
pub mod config;
pub mod db;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod frontmatter;
pub mod get;
pub mod identity;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod report;
pub mod store;
