//! Change-list providers.
//!
//! In CI mode the candidate files are the ones touched by the current pull
//! request rather than a drafts directory. A [`ChangeListProvider`] returns
//! those paths relative to the repository root; filtering by extension and
//! existence happens in [`discovery`](crate::discovery).
//!
//! - [`GithubPullRequestFiles`] lists files through the GitHub REST API,
//!   reading the pull request number from the Actions event payload.
//! - [`GitDiffFiles`] runs `git diff --name-only <base>...HEAD` locally.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

use crate::config::{GithubConfig, SourceConfig};

/// GitHub caps this endpoint at 3000 files (30 pages of 100).
const GITHUB_PAGE_SIZE: usize = 100;
const GITHUB_MAX_PAGES: usize = 30;

#[async_trait]
pub trait ChangeListProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Repository-relative paths changed in the current review unit, in the
    /// order the backend reports them. Deleted files are excluded.
    async fn changed_files(&self) -> Result<Vec<String>>;
}

// ============ GitHub ============

pub struct GithubPullRequestFiles {
    api_url: String,
    repository: String,
    pull_number: u64,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
    #[serde(default)]
    status: String,
}

impl GithubPullRequestFiles {
    /// Resolve repository and pull number from config or the event payload.
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        let repository = config
            .repository
            .clone()
            .context("GITHUB_REPOSITORY not set; cannot list pull request files")?;

        let pull_number = match config.pull_number {
            Some(n) => n,
            None => {
                let path = config
                    .event_path
                    .as_ref()
                    .context("no pull request number: set GITHUB_EVENT_PATH or source.github.pull_number")?;
                read_event_pull_number(path)?
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("content-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository,
            pull_number,
            token: config.token.clone(),
            client,
        })
    }

    fn page_url(&self, page: usize) -> String {
        format!(
            "{}/repos/{}/pulls/{}/files?per_page={}&page={}",
            self.api_url, self.repository, self.pull_number, GITHUB_PAGE_SIZE, page
        )
    }
}

#[async_trait]
impl ChangeListProvider for GithubPullRequestFiles {
    fn name(&self) -> &str {
        "github"
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for page in 1..=GITHUB_MAX_PAGES {
            let mut request = self
                .client
                .get(self.page_url(page))
                .header("Accept", "application/vnd.github+json")
                .header("X-GitHub-Api-Version", "2022-11-28");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                bail!("GitHub API error {}: {}", status, body_text);
            }

            let batch: Vec<PullRequestFile> = response.json().await?;
            let last_page = batch.len() < GITHUB_PAGE_SIZE;
            files.extend(
                batch
                    .into_iter()
                    .filter(|f| f.status != "removed")
                    .map(|f| f.filename),
            );
            if last_page {
                return Ok(files);
            }
        }

        warn!(
            pull = self.pull_number,
            files = files.len(),
            "pull request file list hit the {}-page API limit; later files are not imported",
            GITHUB_MAX_PAGES
        );
        Ok(files)
    }
}

fn read_event_pull_number(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload: {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&content).with_context(|| "Failed to parse event payload")?;
    pull_number_from_event(&json)
        .context("event payload has no pull request number (not a pull_request event?)")
}

fn pull_number_from_event(event: &serde_json::Value) -> Option<u64> {
    event
        .pointer("/pull_request/number")
        .or_else(|| event.get("number"))
        .and_then(|n| n.as_u64())
}

// ============ git diff ============

pub struct GitDiffFiles {
    repo_root: PathBuf,
    base: String,
}

impl GitDiffFiles {
    pub fn new(repo_root: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl ChangeListProvider for GitDiffFiles {
    fn name(&self) -> &str {
        "git"
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let range = format!("{}...HEAD", self.base);
        let output = Command::new("git")
            .args(["diff", "--name-only", "--diff-filter=d", &range])
            .current_dir(&self.repo_root)
            .output()
            .await
            .with_context(|| "Failed to execute 'git diff'. Is git installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git diff failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Build the provider named by `source.change_provider`.
pub fn create_change_provider(config: &SourceConfig) -> Result<Box<dyn ChangeListProvider>> {
    match config.change_provider.as_str() {
        "github" => Ok(Box::new(GithubPullRequestFiles::from_config(&config.github)?)),
        "git" => Ok(Box::new(GitDiffFiles::new(
            config.repo_root.clone(),
            config.git_base.clone(),
        ))),
        other => bail!("Unknown change provider: {}", other),
    }
}
