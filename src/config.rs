//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. An optional TOML file (`--config`, default `./csync.toml`).
//! 2. Environment variables (after `.env` is loaded), matching the variable
//!    names CI workflows already export (`COUCHBASE_URL`, `OPENAI_API_KEY`, ...).
//! 3. CLI flags, applied by the binary.
//!
//! [`Config::validate`] runs once all layers are applied and rejects
//! combinations that would fail mid-batch (missing credentials, embeddings
//! enabled without a provider).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `sqlite`, `couchbase`, or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Database file for the SQLite backend.
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
    /// Couchbase query service base URL, e.g. `http://db.example.com:8093`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_keyspace_part")]
    pub scope: String,
    #[serde(default = "default_keyspace_part")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_sqlite_path(),
            url: None,
            username: None,
            password: None,
            bucket: None,
            scope: default_keyspace_part(),
            collection: default_keyspace_part(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/content.sqlite")
}
fn default_keyspace_part() -> String {
    "_default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Populated from `OPENAI_API_KEY`; never read from the TOML file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_input_tokens: default_max_input_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_input_tokens() -> usize {
    8191
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// How candidate files are discovered.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// List `source_dir`, then move processed files to `dest_dir`.
    #[default]
    Directory,
    /// Use the files changed in the current pull request; nothing is moved.
    Changes,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Changes => "changes",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// `github` or `git`.
    #[serde(default = "default_change_provider")]
    pub change_provider: String,
    /// Root that change-list paths are relative to.
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,
    /// Base ref for the `git` change provider.
    #[serde(default = "default_git_base")]
    pub git_base: String,
    #[serde(default)]
    pub github: GithubConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            source_dir: default_source_dir(),
            dest_dir: default_dest_dir(),
            extensions: default_extensions(),
            change_provider: default_change_provider(),
            repo_root: default_repo_root(),
            git_base: default_git_base(),
            github: GithubConfig::default(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("./drafts")
}
fn default_dest_dir() -> PathBuf {
    PathBuf::from("./published")
}
fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "mdx".to_string()]
}
fn default_change_provider() -> String {
    "github".to_string()
}
fn default_repo_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_git_base() -> String {
    "origin/main".to_string()
}

/// GitHub pull-request context. Normally filled from the Actions environment.
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
    /// `owner/name`.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub pull_number: Option<u64>,
    /// Path to the webhook event payload (`GITHUB_EVENT_PATH`).
    #[serde(default)]
    pub event_path: Option<PathBuf>,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            repository: None,
            pull_number: None,
            event_path: None,
            token: None,
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    /// Compute and store an embedding per document.
    #[serde(default)]
    pub embeddings: bool,
    /// Stop after the first failed document instead of continuing.
    #[serde(default)]
    pub fail_fast: bool,
    /// Discover and validate only; write nothing and move nothing.
    #[serde(default)]
    pub dry_run: bool,
}

/// Read a TOML config file.
///
/// When `required` is false a missing file yields [`Config::default`].
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    if !path.exists() && !required {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}

impl Config {
    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    ///
    /// Blank values are ignored. Unrecognized strategy or boolean values are a
    /// [`SyncError::Config`].
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("COUCHBASE_URL") {
            self.store.url = Some(url);
            self.store.backend = "couchbase".to_string();
        }
        if let Some(v) = get("COUCHBASE_USERNAME") {
            self.store.username = Some(v);
        }
        if let Some(v) = get("COUCHBASE_PASSWORD") {
            self.store.password = Some(v);
        }
        if let Some(v) = get("COUCHBASE_BUCKET") {
            self.store.bucket = Some(v);
        }
        if let Some(v) = get("CSYNC_STORE") {
            self.store.backend = v;
        }
        if let Some(v) = get("CSYNC_SQLITE_PATH") {
            self.store.path = PathBuf::from(v);
        }

        if let Some(v) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(v);
        }
        if let Some(v) = get("CSYNC_EMBEDDING_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Some(v) = get("CSYNC_EMBEDDINGS") {
            self.pipeline.embeddings = env_bool("CSYNC_EMBEDDINGS", &v)?;
        }
        if let Some(v) = get("CSYNC_FAIL_FAST") {
            self.pipeline.fail_fast = env_bool("CSYNC_FAIL_FAST", &v)?;
        }

        if let Some(v) = get("CSYNC_SOURCE_DIR") {
            self.source.source_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CSYNC_DEST_DIR") {
            self.source.dest_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CSYNC_STRATEGY") {
            self.source.strategy = match v.trim().to_ascii_lowercase().as_str() {
                "directory" => Strategy::Directory,
                "changes" => Strategy::Changes,
                _ => {
                    return Err(SyncError::Config(format!(
                        "CSYNC_STRATEGY: unknown strategy '{}'. Must be directory or changes.",
                        v
                    )))
                }
            };
        }

        if let Some(v) = get("GITHUB_TOKEN") {
            self.source.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_REPOSITORY") {
            self.source.github.repository = Some(v);
        }
        if let Some(v) = get("GITHUB_EVENT_PATH") {
            self.source.github.event_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GITHUB_API_URL") {
            self.source.github.api_url = v;
        }
        Ok(())
    }

    /// Reject settings that cannot produce a working batch.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self.store.backend.as_str() {
            "sqlite" => {}
            "memory" if !self.pipeline.dry_run => {
                return Err(SyncError::Config(
                    "the memory store keeps nothing after exit; use it only with --dry-run"
                        .to_string(),
                ))
            }
            "memory" => {}
            "couchbase" => {
                for (name, value) in [
                    ("COUCHBASE_URL", &self.store.url),
                    ("COUCHBASE_USERNAME", &self.store.username),
                    ("COUCHBASE_PASSWORD", &self.store.password),
                    ("COUCHBASE_BUCKET", &self.store.bucket),
                ] {
                    if value.is_none() {
                        return Err(SyncError::Config(format!(
                            "{} must be set for the couchbase store",
                            name
                        )));
                    }
                }
            }
            other => {
                return Err(SyncError::Config(format!(
                    "Unknown store backend: '{}'. Must be sqlite, couchbase, or memory.",
                    other
                )))
            }
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => {
                return Err(SyncError::Config(format!(
                    "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                    other
                )))
            }
        }

        if self.pipeline.embeddings {
            if !self.embedding.is_enabled() {
                return Err(SyncError::Config(
                    "embeddings are enabled but embedding.provider is 'disabled'".to_string(),
                ));
            }
            if self.embedding.max_input_tokens == 0 {
                return Err(SyncError::Config(
                    "embedding.max_input_tokens must be > 0".to_string(),
                ));
            }
            if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
                return Err(SyncError::Config(
                    "OPENAI_API_KEY environment variable not set".to_string(),
                ));
            }
        }

        if self.source.extensions.is_empty() {
            return Err(SyncError::Config(
                "source.extensions must not be empty".to_string(),
            ));
        }

        if self.source.strategy == Strategy::Changes {
            match self.source.change_provider.as_str() {
                "github" | "git" => {}
                other => {
                    return Err(SyncError::Config(format!(
                        "Unknown change provider: '{}'. Must be github or git.",
                        other
                    )))
                }
            }
        }

        Ok(())
    }
}

fn env_bool(name: &str, value: &str) -> Result<bool, SyncError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncError::Config(format!(
            "{}: expected a boolean (true/false), got '{}'",
            name, value
        ))),
    }
}
