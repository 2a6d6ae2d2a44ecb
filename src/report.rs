//! Batch summary.
//!
//! A [`SyncReport`] is the single result of a sync run. It names every failed
//! document with its path, id (when one was derived), and failure kind, so a
//! human can fix the inputs and rerun. Rendered as indented text for humans
//! or as JSON for automation.

use serde::Serialize;
use std::io::{self, Write};

use crate::error::FailureKind;

/// A document that did not complete the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentFailure {
    pub path: String,
    pub id: Option<String>,
    pub kind: FailureKind,
    pub error: String,
}

/// A non-fatal problem on a document that otherwise succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWarning {
    pub path: String,
    pub id: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

/// A document whose record was written (or would be, in a dry run).
#[derive(Debug, Clone, Serialize)]
pub struct ImportedDocument {
    pub path: String,
    pub id: String,
    pub embedded: bool,
    pub moved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub source: String,
    pub store: String,
    pub dry_run: bool,
    pub discovered: usize,
    pub succeeded: usize,
    pub embeddings_written: usize,
    pub moved: usize,
    /// Candidates never attempted because the run stopped early.
    pub skipped: usize,
    pub aborted: bool,
    pub documents: Vec<ImportedDocument>,
    pub failures: Vec<DocumentFailure>,
    pub warnings: Vec<DocumentWarning>,
}

impl SyncReport {
    pub fn new(source: impl Into<String>, store: impl Into<String>, dry_run: bool) -> Self {
        Self {
            source: source.into(),
            store: store.into(),
            dry_run,
            discovered: 0,
            succeeded: 0,
            embeddings_written: 0,
            moved: 0,
            skipped: 0,
            aborted: false,
            documents: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_failure(
        &mut self,
        path: &str,
        id: Option<&str>,
        kind: FailureKind,
        error: impl Into<String>,
    ) {
        self.failures.push(DocumentFailure {
            path: path.to_string(),
            id: id.map(str::to_string),
            kind,
            error: error.into(),
        });
    }

    pub fn record_warning(
        &mut self,
        path: &str,
        id: Option<&str>,
        kind: FailureKind,
        message: impl Into<String>,
    ) {
        self.warnings.push(DocumentWarning {
            path: path.to_string(),
            id: id.map(str::to_string),
            kind,
            message: message.into(),
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Documents whose record reached the store.
    pub fn persisted(&self) -> usize {
        if self.dry_run {
            0
        } else {
            self.documents.len()
        }
    }

    /// True when every candidate was attempted and none failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    pub fn write_human<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.dry_run {
            writeln!(out, "sync {} (dry-run)", self.source)?;
        } else {
            writeln!(out, "sync {}", self.source)?;
        }
        writeln!(out, "  store: {}", self.store)?;
        writeln!(out, "  discovered: {} files", self.discovered)?;
        if self.dry_run {
            writeln!(out, "  would upsert: {}", self.documents.len())?;
            for doc in &self.documents {
                writeln!(out, "    {} -> {}", doc.path, doc.id)?;
            }
        } else {
            writeln!(out, "  upserted documents: {}", self.persisted())?;
            writeln!(out, "  embeddings written: {}", self.embeddings_written)?;
            writeln!(out, "  moved: {}", self.moved)?;
        }
        writeln!(out, "  succeeded: {}", self.succeeded)?;
        writeln!(out, "  failed: {}", self.failed())?;
        for f in &self.failures {
            match &f.id {
                Some(id) => writeln!(out, "    {} ({}) [{}] {}", f.path, id, f.kind.as_str(), f.error)?,
                None => writeln!(out, "    {} [{}] {}", f.path, f.kind.as_str(), f.error)?,
            }
        }
        if !self.warnings.is_empty() {
            writeln!(out, "  warnings: {}", self.warnings.len())?;
            for w in &self.warnings {
                writeln!(out, "    {} [{}] {}", w.path, w.kind.as_str(), w.message)?;
            }
        }
        if self.aborted {
            writeln!(out, "  aborted: {} not attempted", self.skipped)?;
        }
        writeln!(out, "{}", if self.is_success() { "ok" } else { "failed" })?;
        Ok(())
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyncReport {
        let mut r = SyncReport::new("directory:./drafts", "memory", false);
        r.discovered = 2;
        r.succeeded = 1;
        r.documents.push(ImportedDocument {
            path: "a.md".to_string(),
            id: "blog_a_0".to_string(),
            embedded: false,
            moved: true,
        });
        r.moved = 1;
        r.record_failure(
            "b.md",
            None,
            FailureKind::Validation,
            "missing or empty 'date'",
        );
        r
    }

    #[test]
    fn human_output_names_failures() {
        let mut buf = Vec::new();
        sample().write_human(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("upserted documents: 1"));
        assert!(text.contains("failed: 1"));
        assert!(text.contains("b.md [validation] missing or empty 'date'"));
        assert!(text.trim_end().ends_with("failed"));
    }

    #[test]
    fn json_output_is_structured() {
        let mut buf = Vec::new();
        sample().write_json(&mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failures"][0]["kind"], "validation");
        assert_eq!(json["failures"][0]["path"], "b.md");
        assert!(json["failures"][0]["id"].is_null());
    }

    #[test]
    fn success_requires_no_failures_and_no_abort() {
        let mut r = SyncReport::new("s", "memory", false);
        assert!(r.is_success());
        r.aborted = true;
        assert!(!r.is_success());
        assert!(!sample().is_success());
    }
}
