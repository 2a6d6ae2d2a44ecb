//! YAML frontmatter splitter.
//!
//! A document carries frontmatter when its first line is exactly `---`. The
//! block runs until the next line that is exactly `---` (or `...`), and the
//! body starts on the line after the closing fence. Documents without an
//! opening fence have empty metadata and the whole text as body.

use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::models::Post;

const FENCE: &str = "---";
const ALT_CLOSE: &str = "...";

/// Split raw Markdown into a [`Post`].
///
/// Fails with [`SyncError::Parse`] when the opening fence has no matching
/// close, the YAML is malformed, or the block is not a mapping.
pub fn parse(raw: &str) -> Result<Post, SyncError> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let Some((first, rest)) = split_first_line(text) else {
        return Ok(no_frontmatter(text));
    };
    if first.trim_end() != FENCE {
        return Ok(no_frontmatter(text));
    }

    let mut yaml_len = 0usize;
    let mut remaining = rest;
    loop {
        let Some((line, after)) = split_first_line(remaining) else {
            // Last line without trailing newline.
            if is_close(remaining) {
                let metadata = parse_yaml(&rest[..yaml_len])?;
                return Ok(Post {
                    metadata,
                    body: String::new(),
                });
            }
            return Err(SyncError::Parse(
                "frontmatter block is not closed".to_string(),
            ));
        };
        if is_close(line) {
            let metadata = parse_yaml(&rest[..yaml_len])?;
            return Ok(Post {
                metadata,
                body: after.to_string(),
            });
        }
        yaml_len += remaining.len() - after.len();
        remaining = after;
    }
}

fn no_frontmatter(text: &str) -> Post {
    Post {
        metadata: Map::new(),
        body: text.to_string(),
    }
}

fn is_close(line: &str) -> bool {
    let line = line.trim_end();
    line == FENCE || line == ALT_CLOSE
}

/// Returns `(line_without_newline, rest_after_newline)`, or `None` when
/// `text` has no newline.
fn split_first_line(text: &str) -> Option<(&str, &str)> {
    let idx = text.find('\n')?;
    let line = text[..idx].strip_suffix('\r').unwrap_or(&text[..idx]);
    Some((line, &text[idx + 1..]))
}

fn parse_yaml(yaml: &str) -> Result<Map<String, Value>, SyncError> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| SyncError::Parse(format!("invalid frontmatter YAML: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(SyncError::Parse(format!(
            "frontmatter must be a mapping, found {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
