//! Sync progress reporting.
//!
//! Progress goes to **stderr** so stdout stays reserved for the summary.
//! Three modes: off, one human line per document, or one JSON object per
//! line for CI log parsers.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// Listing candidates; total not known yet.
    Discovering { source: String },
    /// About to process document `n` of `total`.
    Processing {
        source: String,
        n: u64,
        total: u64,
        path: String,
    },
}

pub trait SyncProgressReporter: Send + Sync {
    fn report(&self, event: SyncProgressEvent);
}

/// "sync directory:./drafts  12 / 1,034  drafts/post.md"
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Discovering { source } => {
                format!("sync {}  discovering...\n", source)
            }
            SyncProgressEvent::Processing {
                source,
                n,
                total,
                path,
            } => format!(
                "sync {}  {} / {}  {}\n",
                source,
                format_number(*n),
                format_number(*total),
                path
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

fn event_json(event: &SyncProgressEvent) -> serde_json::Value {
    match event {
        SyncProgressEvent::Discovering { source } => serde_json::json!({
            "event": "progress",
            "source": source,
            "phase": "discovering"
        }),
        SyncProgressEvent::Processing {
            source,
            n,
            total,
            path,
        } => serde_json::json!({
            "event": "progress",
            "source": source,
            "phase": "processing",
            "n": n,
            "total": total,
            "path": path
        }),
    }
}

pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn processing_event_json() {
        let v = event_json(&SyncProgressEvent::Processing {
            source: "directory:drafts".to_string(),
            n: 2,
            total: 5,
            path: "b.md".to_string(),
        });
        assert_eq!(v["phase"], "processing");
        assert_eq!(v["n"], 2);
        assert_eq!(v["path"], "b.md");
    }
}
