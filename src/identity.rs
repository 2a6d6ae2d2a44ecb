//! Stable document identifiers.
//!
//! A post's id is `blog_<slug>_<epoch-millis>`, computed only from its
//! `title` and `date`. Re-importing an unchanged post therefore targets the
//! same key, so reruns overwrite instead of duplicating. Titles that
//! normalize to the same slug on the same date collide.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::SyncError;
use crate::models::Post;

const ID_PREFIX: &str = "blog";
const EMBEDDING_PREFIX: &str = "embedding::";

/// Naive layouts accepted for `date`, all interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying layouts that RFC 3339 rejects (space separator).
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Derive the idempotent document id for a post.
///
/// # Errors
///
/// [`SyncError::Validation`] if `title` is missing, not a string, or blank,
/// or if `date` is missing or cannot be parsed.
///
/// # Example
///
/// ```rust
/// use content_sync::frontmatter;
/// use content_sync::identity::derive_document_id;
///
/// let post = frontmatter::parse("---\ntitle: Hello World\ndate: 2024-01-15T00:00:00Z\n---\n").unwrap();
/// assert_eq!(derive_document_id(&post).unwrap(), "blog_hello-world_1705276800000");
/// ```
pub fn derive_document_id(post: &Post) -> Result<String, SyncError> {
    let title = post
        .title()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| SyncError::Validation("missing or empty 'title'".to_string()))?;
    let date = post
        .date()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| SyncError::Validation("missing or empty 'date'".to_string()))?;
    let millis = parse_date_millis(date)
        .ok_or_else(|| SyncError::Validation(format!("unparseable 'date': {:?}", date)))?;

    Ok(format!("{}_{}_{}", ID_PREFIX, slugify(title), millis))
}

/// Collapse every whitespace run to a single `-` and lower-case the result.
///
/// Leading and trailing whitespace is not trimmed; it becomes a `-` like any
/// other run.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_space = false;
    for c in title.chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
                in_space = true;
            }
        } else {
            in_space = false;
            slug.extend(c.to_lowercase());
        }
    }
    slug
}

/// Parse a calendar date or date-time into milliseconds since the Unix epoch.
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD` (UTC midnight), and naive
/// `YYYY-MM-DD[T ]HH:MM[:SS[.fff]]` (UTC).
pub fn parse_date_millis(date: &str) -> Option<i64> {
    let date = date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(date) {
        return Some(dt.timestamp_millis());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(date, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Store key for a document's embedding record.
pub fn embedding_key(document_id: &str) -> String {
    format!("{}{}", EMBEDDING_PREFIX, document_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn post(title: Option<&str>, date: Option<&str>) -> Post {
        let mut metadata = Map::new();
        if let Some(t) = title {
            metadata.insert("title".into(), json!(t));
        }
        if let Some(d) = date {
            metadata.insert("date".into(), json!(d));
        }
        Post {
            metadata,
            body: String::new(),
        }
    }

    #[test]
    fn hello_world_id() {
        let p = post(Some("Hello World"), Some("2024-01-15T00:00:00Z"));
        assert_eq!(
            derive_document_id(&p).unwrap(),
            "blog_hello-world_1705276800000"
        );
        assert_eq!(derive_document_id(&p).unwrap(), derive_document_id(&p).unwrap());
    }

    #[test]
    fn date_only_is_utc_midnight() {
        let p = post(Some("Hello World"), Some("2024-01-15"));
        assert_eq!(
            derive_document_id(&p).unwrap(),
            "blog_hello-world_1705276800000"
        );
    }

    #[test]
    fn slug_collapses_whitespace_runs_without_trimming() {
        assert_eq!(slugify("Hello   World"), "hello-world");
        assert_eq!(slugify(" Tabs\tand\nLines "), "-tabs-and-lines-");
        assert_eq!(slugify("Rust: Ownership 101"), "rust:-ownership-101");
    }

    #[test]
    fn colliding_titles_share_slug() {
        assert_eq!(slugify("Hello World"), slugify("hello  world"));
    }

    #[test]
    fn accepted_date_layouts() {
        assert_eq!(parse_date_millis("2024-01-15T01:00:00+01:00"), Some(1705276800000));
        assert_eq!(parse_date_millis("2024-01-15T00:00:00.250Z"), Some(1705276800250));
        assert_eq!(parse_date_millis("Mon, 15 Jan 2024 00:00:00 +0000"), Some(1705276800000));
        assert_eq!(parse_date_millis("2024-01-15 00:00:00"), Some(1705276800000));
        assert_eq!(parse_date_millis("2024-01-15T00:00"), Some(1705276800000));
        assert_eq!(parse_date_millis("1969-12-31"), Some(-86_400_000));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date_millis("yesterday"), None);
        assert_eq!(parse_date_millis("2024-13-01"), None);
    }

    #[test]
    fn missing_fields_are_validation_errors() {
        for p in [
            post(None, Some("2024-01-15")),
            post(Some("T"), None),
            post(Some("   "), Some("2024-01-15")),
            post(Some("T"), Some("not a date")),
        ] {
            assert!(matches!(
                derive_document_id(&p),
                Err(SyncError::Validation(_))
            ));
        }
    }

    #[test]
    fn non_string_title_is_rejected() {
        let mut p = post(None, Some("2024-01-15"));
        p.metadata.insert("title".into(), json!(42));
        assert!(derive_document_id(&p).is_err());
    }

    #[test]
    fn embedding_key_prefix() {
        assert_eq!(embedding_key("blog_a_1"), "embedding::blog_a_1");
    }
}
