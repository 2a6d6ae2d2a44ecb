//! Candidate file discovery.
//!
//! Two strategies produce the ordered list of files the pipeline imports:
//!
//! - **Directory**: the entries of one directory (not recursive) whose names
//!   end in a configured extension, in the order the filesystem lists them.
//!   An empty result is an error so a misconfigured path cannot silently
//!   turn a run into a no-op.
//! - **Change list**: the paths a [`ChangeListProvider`] reports for the
//!   current pull request, filtered the same way. Paths that no longer exist
//!   on disk are skipped. An empty result is allowed, since most pull
//!   requests touch no posts.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::changes::{create_change_provider, ChangeListProvider};
use crate::config::{SourceConfig, Strategy};
use crate::error::SyncError;
use crate::models::{CandidateFile, CandidateOrigin};

/// Matches file names against a list of extensions (`md` → `*.md`).
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    set: GlobSet,
}

impl ExtensionFilter {
    pub fn new(extensions: &[String]) -> Result<Self, SyncError> {
        let mut builder = GlobSetBuilder::new();
        for ext in extensions {
            let ext = ext.trim_start_matches('.');
            let glob = Glob::new(&format!("*.{}", ext))
                .map_err(|e| SyncError::Config(format!("invalid extension '{}': {}", ext, e)))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| SyncError::Config(format!("invalid extension list: {}", e)))?;
        Ok(Self { set })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.set.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}

/// Where to look for candidates.
pub enum FileSource {
    Directory {
        dir: PathBuf,
        filter: ExtensionFilter,
    },
    ChangeList {
        provider: Box<dyn ChangeListProvider>,
        repo_root: PathBuf,
        filter: ExtensionFilter,
    },
}

impl FileSource {
    /// Build the source selected by `config.strategy`.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SyncError> {
        let filter = ExtensionFilter::new(&config.extensions)?;
        match config.strategy {
            Strategy::Directory => Ok(Self::Directory {
                dir: config.source_dir.clone(),
                filter,
            }),
            Strategy::Changes => {
                let provider = create_change_provider(config)
                    .map_err(|e| SyncError::Config(format!("{:#}", e)))?;
                Ok(Self::ChangeList {
                    provider,
                    repo_root: config.repo_root.clone(),
                    filter,
                })
            }
        }
    }

    pub fn origin(&self) -> CandidateOrigin {
        match self {
            Self::Directory { .. } => CandidateOrigin::Directory,
            Self::ChangeList { .. } => CandidateOrigin::ChangeList,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Directory { dir, .. } => format!("directory:{}", dir.display()),
            Self::ChangeList { provider, .. } => format!("changes:{}", provider.name()),
        }
    }

    /// Produce the ordered candidate list.
    ///
    /// # Errors
    ///
    /// [`SyncError::Discovery`] when the directory is unreadable or has no
    /// matching files, or when the change-list provider fails.
    pub async fn discover(&self) -> Result<Vec<CandidateFile>, SyncError> {
        match self {
            Self::Directory { dir, filter } => discover_directory(dir, filter),
            Self::ChangeList {
                provider,
                repo_root,
                filter,
            } => discover_changes(provider.as_ref(), repo_root, filter).await,
        }
    }
}

pub fn discover_directory(
    dir: &Path,
    filter: &ExtensionFilter,
) -> Result<Vec<CandidateFile>, SyncError> {
    if !dir.is_dir() {
        return Err(SyncError::Discovery(format!(
            "source directory does not exist: {}",
            dir.display()
        )));
    }

    let mut candidates = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);
    for entry in walker {
        let entry = entry.map_err(|e| {
            SyncError::Discovery(format!("error reading {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() || !filter.matches(entry.path()) {
            continue;
        }
        let display = entry.file_name().to_string_lossy().to_string();
        candidates.push(CandidateFile {
            path: entry.path().to_path_buf(),
            display,
            origin: CandidateOrigin::Directory,
        });
    }

    if candidates.is_empty() {
        return Err(SyncError::Discovery(format!(
            "No Markdown files found in directory: {}",
            dir.display()
        )));
    }

    info!(dir = %dir.display(), count = candidates.len(), "discovered files");
    Ok(candidates)
}

pub async fn discover_changes(
    provider: &dyn ChangeListProvider,
    repo_root: &Path,
    filter: &ExtensionFilter,
) -> Result<Vec<CandidateFile>, SyncError> {
    let changed = provider.changed_files().await.map_err(|e| {
        SyncError::Discovery(format!("{} change list failed: {:#}", provider.name(), e))
    })?;
    let total = changed.len();

    let mut candidates = Vec::new();
    for rel in changed {
        let path = repo_root.join(&rel);
        if !filter.matches(&path) {
            continue;
        }
        if !path.is_file() {
            debug!(path = %rel, "changed file not present on disk; skipping");
            continue;
        }
        candidates.push(CandidateFile {
            path,
            display: rel,
            origin: CandidateOrigin::ChangeList,
        });
    }

    info!(
        provider = provider.name(),
        changed = total,
        count = candidates.len(),
        "discovered changed files"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    fn markdown() -> ExtensionFilter {
        ExtensionFilter::new(&["md".to_string(), "mdx".to_string()]).unwrap()
    }

    struct FixedChanges(Vec<&'static str>);

    #[async_trait]
    impl ChangeListProvider for FixedChanges {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn changed_files(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FailingChanges;

    #[async_trait]
    impl ChangeListProvider for FailingChanges {
        fn name(&self) -> &str {
            "failing"
        }
        async fn changed_files(&self) -> Result<Vec<String>> {
            anyhow::bail!("api down")
        }
    }

    #[test]
    fn filter_matches_extensions_case_sensitively() {
        let f = markdown();
        assert!(f.matches(Path::new("a.md")));
        assert!(f.matches(Path::new("dir/b.mdx")));
        assert!(!f.matches(Path::new("c.markdown")));
        assert!(!f.matches(Path::new("d.MD")));
        assert!(!f.matches(Path::new("md")));
    }

    #[test]
    fn filter_accepts_leading_dots() {
        let f = ExtensionFilter::new(&[".txt".to_string()]).unwrap();
        assert!(f.matches(Path::new("notes.txt")));
    }

    #[test]
    fn directory_lists_only_matching_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        fs::write(tmp.path().join("b.mdx"), "b").unwrap();
        fs::write(tmp.path().join("c.txt"), "c").unwrap();
        fs::create_dir(tmp.path().join("nested.md")).unwrap();
        fs::write(tmp.path().join("nested.md/d.md"), "d").unwrap();

        let found = discover_directory(tmp.path(), &markdown()).unwrap();
        let mut names: Vec<_> = found.iter().map(|c| c.display.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.md", "b.mdx"]);
        assert!(found.iter().all(|c| c.origin == CandidateOrigin::Directory));
    }

    #[test]
    fn empty_directory_is_discovery_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("readme.txt"), "x").unwrap();
        let err = discover_directory(tmp.path(), &markdown()).unwrap_err();
        assert!(matches!(err, SyncError::Discovery(_)));
    }

    #[test]
    fn missing_directory_is_discovery_error() {
        let err = discover_directory(Path::new("/nonexistent/drafts"), &markdown())
            .unwrap_err();
        assert!(matches!(err, SyncError::Discovery(_)));
    }

    #[tokio::test]
    async fn change_list_filters_and_keeps_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("posts")).unwrap();
        fs::write(tmp.path().join("posts/z.md"), "z").unwrap();
        fs::write(tmp.path().join("posts/a.mdx"), "a").unwrap();
        fs::write(tmp.path().join("src.rs"), "fn main() {}").unwrap();

        let source = FileSource::ChangeList {
            provider: Box::new(FixedChanges(vec![
                "posts/z.md",
                "src.rs",
                "posts/deleted.md",
                "posts/a.mdx",
            ])),
            repo_root: tmp.path().to_path_buf(),
            filter: markdown(),
        };
        let found = source.discover().await.unwrap();
        let names: Vec<_> = found.iter().map(|c| c.display.as_str()).collect();
        assert_eq!(names, vec!["posts/z.md", "posts/a.mdx"]);
        assert_eq!(source.origin(), CandidateOrigin::ChangeList);
    }

    #[test]
    fn from_config_selects_strategy() {
        let mut config = SourceConfig::default();
        let source = FileSource::from_config(&config).unwrap();
        assert_eq!(source.origin(), CandidateOrigin::Directory);
        assert_eq!(source.label(), "directory:./drafts");

        config.strategy = Strategy::Changes;
        config.change_provider = "git".to_string();
        let source = FileSource::from_config(&config).unwrap();
        assert_eq!(source.origin(), CandidateOrigin::ChangeList);
        assert_eq!(source.label(), "changes:git");

        config.change_provider = "svn".to_string();
        assert!(matches!(
            FileSource::from_config(&config),
            Err(SyncError::Config(_))
        ));
    }

    #[tokio::test]
    async fn change_list_may_be_empty() {
        let found = discover_changes(
            &FixedChanges(vec!["Cargo.toml"]),
            Path::new("."),
            &markdown(),
        )
        .await
        .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_discovery_error() {
        let err = discover_changes(&FailingChanges, Path::new("."), &markdown())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Discovery(_)));
        assert!(err.to_string().contains("api down"));
    }
}
