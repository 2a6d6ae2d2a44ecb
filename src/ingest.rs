//! Migration orchestration.
//!
//! [`Pipeline`] drives one batch. Candidates come from a [`FileSource`] and
//! are processed strictly one at a time, in discovery order:
//!
//! ```text
//! read → parse frontmatter → derive id → upsert record
//!      → (budget → embed → upsert embedding) → relocate
//! ```
//!
//! A failure at read, parse, id, upsert, or relocation fails that document
//! only; it is logged, recorded in the [`SyncReport`], and the batch moves on.
//! With `fail_fast` the batch stops after the first failure instead.
//! Embedding problems never fail a document: the record is already written,
//! so they are recorded as warnings and no embedding record is stored.
//!
//! Relocation is a no-clobber rename into the destination directory. When the
//! destination exists the document stays persisted and the source stays put;
//! the next run re-upserts the same key and tries the move again.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::budget::TokenBudgeter;
use crate::config::{Config, EmbeddingConfig};
use crate::discovery::FileSource;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{FailureKind, SyncError};
use crate::frontmatter;
use crate::identity;
use crate::models::{CandidateFile, CandidateOrigin, DocumentRecord, EmbeddingRecord};
use crate::progress::{NoProgress, SyncProgressEvent, SyncProgressReporter};
use crate::report::{ImportedDocument, SyncReport};
use crate::store::{create_store, DocumentStore};

/// Per-batch switches.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub fail_fast: bool,
    /// Where directory-sourced files are moved after their record is written.
    pub dest_dir: PathBuf,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: config.pipeline.dry_run,
            fail_fast: config.pipeline.fail_fast,
            dest_dir: config.source.dest_dir.clone(),
        }
    }
}

/// An embedding provider paired with the token budget for its model.
pub struct Embedder {
    provider: Box<dyn EmbeddingProvider>,
    budget: TokenBudgeter,
}

impl Embedder {
    pub fn new(provider: Box<dyn EmbeddingProvider>, budget: TokenBudgeter) -> Self {
        Self { provider, budget }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider = create_provider(config)?;
        let budget = TokenBudgeter::for_model(provider.model_name(), config.max_input_tokens);
        Ok(Self::new(provider, budget))
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn dims(&self) -> usize {
        self.provider.dims()
    }
}

/// Outcome of a successful relocation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocation {
    Moved(PathBuf),
    /// The source vanished after discovery; nothing to move.
    SourceMissing,
}

/// A per-document failure, with the id when derivation got that far.
struct DocumentError {
    id: Option<String>,
    kind: FailureKind,
    message: String,
}

impl DocumentError {
    fn anonymous(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            message: message.into(),
        }
    }

    fn with_id(id: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.to_string()),
            kind,
            message: message.into(),
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    source: FileSource,
    embedder: Option<Embedder>,
    progress: Box<dyn SyncProgressReporter>,
    options: SyncOptions,
}

impl Pipeline {
    pub fn new(store: Arc<dyn DocumentStore>, source: FileSource, options: SyncOptions) -> Self {
        Self {
            store,
            source,
            embedder: None,
            progress: Box::new(NoProgress),
            options,
        }
    }

    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn SyncProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run one batch.
    ///
    /// # Errors
    ///
    /// Only [`SyncError::Discovery`]: nothing was processed. Per-document
    /// failures are in the returned report.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let label = self.source.label();
        self.progress.report(SyncProgressEvent::Discovering {
            source: label.clone(),
        });

        let candidates = self.source.discover().await?;
        let mut report = SyncReport::new(label.clone(), self.store.name(), self.options.dry_run);
        report.discovered = candidates.len();
        let total = candidates.len() as u64;

        for (i, candidate) in candidates.iter().enumerate() {
            self.progress.report(SyncProgressEvent::Processing {
                source: label.clone(),
                n: i as u64 + 1,
                total,
                path: candidate.display.clone(),
            });

            match self.process(candidate, &mut report).await {
                Ok(()) => report.succeeded += 1,
                Err(failure) => {
                    error!(
                        path = %candidate.display,
                        id = failure.id.as_deref().unwrap_or("-"),
                        kind = failure.kind.as_str(),
                        error = %failure.message,
                        "document failed"
                    );
                    report.record_failure(
                        &candidate.display,
                        failure.id.as_deref(),
                        failure.kind,
                        failure.message,
                    );
                    if self.options.fail_fast {
                        report.aborted = true;
                        report.skipped = candidates.len() - i - 1;
                        warn!(skipped = report.skipped, "fail-fast: stopping batch");
                        break;
                    }
                }
            }
        }

        info!(
            source = %label,
            succeeded = report.succeeded,
            failed = report.failed(),
            embeddings = report.embeddings_written,
            moved = report.moved,
            "sync complete"
        );
        Ok(report)
    }

    async fn process(
        &self,
        candidate: &CandidateFile,
        report: &mut SyncReport,
    ) -> Result<(), DocumentError> {
        let raw = std::fs::read_to_string(&candidate.path).map_err(|e| {
            DocumentError::anonymous(
                FailureKind::Read,
                format!("{}: {}", candidate.path.display(), e),
            )
        })?;
        let post = frontmatter::parse(&raw)
            .map_err(|e| DocumentError::anonymous(FailureKind::Parse, e.message()))?;
        let id = identity::derive_document_id(&post)
            .map_err(|e| DocumentError::anonymous(FailureKind::Validation, e.message()))?;
        let record = DocumentRecord::from_post(&post).into_value();

        let mut doc = ImportedDocument {
            path: candidate.display.clone(),
            id: id.clone(),
            embedded: false,
            moved: false,
        };

        if self.options.dry_run {
            debug!(path = %candidate.display, id = %id, "dry-run: would upsert");
            report.documents.push(doc);
            return Ok(());
        }

        self.store.upsert(&id, &record).await.map_err(|e| {
            DocumentError::with_id(&id, FailureKind::Upsert, format!("{:#}", e))
        })?;
        info!(path = %candidate.display, id = %id, "upserted document");

        if let Some(embedder) = &self.embedder {
            doc.embedded = self
                .embed(embedder, &id, &post.body, candidate, report)
                .await;
            if doc.embedded {
                report.embeddings_written += 1;
            }
        }

        if candidate.origin == CandidateOrigin::Directory {
            match relocate(&candidate.path, &self.options.dest_dir) {
                Ok(Relocation::Moved(dest)) => {
                    info!(path = %candidate.display, dest = %dest.display(), "moved");
                    doc.moved = true;
                    report.moved += 1;
                }
                Ok(Relocation::SourceMissing) => {
                    warn!(path = %candidate.display, "source file no longer exists; not moved");
                    report.record_warning(
                        &candidate.display,
                        Some(&id),
                        FailureKind::Relocation,
                        "source file no longer exists; not moved",
                    );
                }
                Err(e) => {
                    report.documents.push(doc);
                    return Err(DocumentError::with_id(
                        &id,
                        FailureKind::Relocation,
                        e.message(),
                    ));
                }
            }
        }

        report.documents.push(doc);
        Ok(())
    }

    /// Budget, embed, and store the embedding record. Returns whether a
    /// record was written.
    async fn embed(
        &self,
        embedder: &Embedder,
        id: &str,
        body: &str,
        candidate: &CandidateFile,
        report: &mut SyncReport,
    ) -> bool {
        let text = embedder.budget.fit(body);
        let problem = match embedder.provider.embed(text).await {
            Ok(vector) if vector.is_empty() => "provider returned an empty vector".to_string(),
            Ok(vector) => {
                let record = EmbeddingRecord::new(id, embedder.model_name(), vector);
                let key = identity::embedding_key(id);
                match self.store.upsert(&key, &record.to_value()).await {
                    Ok(()) => {
                        debug!(id = %id, key = %key, "stored embedding");
                        return true;
                    }
                    Err(e) => format!("embedding upsert failed: {:#}", e),
                }
            }
            Err(e) => format!("{:#}", e),
        };

        warn!(path = %candidate.display, id = %id, error = %problem, "no embedding stored");
        report.record_warning(&candidate.display, Some(id), FailureKind::Embedding, problem);
        false
    }
}

/// Move `source` into `dest_dir` under the same file name without
/// overwriting. Creates `dest_dir` if needed.
pub fn relocate(source: &Path, dest_dir: &Path) -> Result<Relocation, SyncError> {
    if !source.exists() {
        return Ok(Relocation::SourceMissing);
    }
    let file_name = source.file_name().ok_or_else(|| {
        SyncError::Relocation(format!("{} has no file name", source.display()))
    })?;

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        SyncError::Relocation(format!("cannot create {}: {}", dest_dir.display(), e))
    })?;

    let dest = dest_dir.join(file_name);
    if dest.symlink_metadata().is_ok() {
        return Err(SyncError::Relocation(format!(
            "destination already exists: {}",
            dest.display()
        )));
    }

    std::fs::rename(source, &dest).map_err(|e| {
        SyncError::Relocation(format!(
            "{} -> {}: {}",
            source.display(),
            dest.display(),
            e
        ))
    })?;
    Ok(Relocation::Moved(dest))
}

/// Build every collaborator from `config` and run one batch.
pub async fn run_sync(
    config: &Config,
    progress: Box<dyn SyncProgressReporter>,
) -> Result<SyncReport> {
    config.validate()?;

    let source = FileSource::from_config(&config.source)?;
    let store: Arc<dyn DocumentStore> = Arc::from(create_store(&config.store).await?);

    let mut pipeline =
        Pipeline::new(store, source, SyncOptions::from_config(config)).with_progress(progress);
    if config.pipeline.embeddings {
        let embedder = Embedder::from_config(&config.embedding)?;
        info!(
            model = embedder.model_name(),
            dims = embedder.dims(),
            "embeddings enabled"
        );
        pipeline = pipeline.with_embedder(embedder);
    }

    Ok(pipeline.run().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn relocate_moves_and_creates_dest() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("post.md");
        fs::write(&src, "x").unwrap();
        let dest_dir = tmp.path().join("published/2024");

        let moved = relocate(&src, &dest_dir).unwrap();
        assert_eq!(moved, Relocation::Moved(dest_dir.join("post.md")));
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dest_dir.join("post.md")).unwrap(), "x");
    }

    #[test]
    fn relocate_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("post.md");
        fs::write(&src, "new").unwrap();
        let dest_dir = tmp.path().join("published");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("post.md"), "old").unwrap();

        let err = relocate(&src, &dest_dir).unwrap_err();
        assert!(matches!(err, SyncError::Relocation(_)));
        assert!(src.exists());
        assert_eq!(fs::read_to_string(dest_dir.join("post.md")).unwrap(), "old");
    }

    #[test]
    fn relocate_skips_missing_source() {
        let tmp = TempDir::new().unwrap();
        let dest_dir = tmp.path().join("published");
        let result = relocate(&tmp.path().join("gone.md"), &dest_dir).unwrap();
        assert_eq!(result, Relocation::SourceMissing);
        assert!(!dest_dir.exists());
    }

    #[tokio::test]
    async fn memory_store_sync_is_refused_before_moving_drafts() {
        let tmp = TempDir::new().unwrap();
        let drafts = tmp.path().join("drafts");
        let published = tmp.path().join("published");
        fs::create_dir_all(&drafts).unwrap();
        fs::write(
            drafts.join("hello.md"),
            "---\ntitle: Hello World\ndate: 2024-01-15\n---\nBody.\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.store.backend = "memory".to_string();
        config.source.source_dir = drafts.clone();
        config.source.dest_dir = published.clone();

        let err = run_sync(&config, Box::new(NoProgress)).await.unwrap_err();
        assert!(err.to_string().contains("dry-run"));
        assert!(drafts.join("hello.md").exists());
        assert!(!published.exists());

        config.pipeline.dry_run = true;
        let report = run_sync(&config, Box::new(NoProgress)).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.moved, 0);
        assert!(drafts.join("hello.md").exists());
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.pipeline.fail_fast = true;
        let options = SyncOptions::from_config(&config);
        assert!(options.fail_fast);
        assert!(!options.dry_run);
        assert_eq!(options.dest_dir, PathBuf::from("./published"));
    }
}
