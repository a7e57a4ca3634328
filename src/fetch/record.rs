//! The content record produced by every fetch path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::article::ArticleExtractor;
use crate::domain::{Domain, UNPARSABLE_DOMAIN};
use crate::normalize::{StandardizeOptions, is_generic_url, standardize_url};

/// Reason phrase the archive path records on success.
pub const ARCHIVE_OK_REASON: &str = "OK";

/// Field names of [`ContentRecord`]; extra fields with these names are dropped.
const BASE_FIELDS: &[&str] = &[
    "original_url",
    "resolved_url",
    "resolved_domain",
    "resolved_netloc",
    "standardized_url",
    "is_generic_url",
    "response_code",
    "response_reason",
    "fetch_error",
    "resolved_text",
    "article_maintext",
    "fetch_path",
    "fetched_at",
];

/// Which entry point produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPath {
    /// Fetched from the live web.
    Active,
    /// Fetched from a web archive snapshot.
    Archived,
}

/// Everything learned about one fetched URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// The URL as requested.
    pub original_url: String,
    /// Destination, synthetic failure endpoint, or archived original URL.
    pub resolved_url: Option<String>,
    /// Domain of `resolved_url`, absent until something was resolved.
    pub resolved_domain: Option<Domain>,
    /// `resolved_url` standardized down to its host.
    pub resolved_netloc: String,
    /// `resolved_url` standardized with the default options.
    pub standardized_url: String,
    /// Whether `resolved_url` looks like a site front page.
    pub is_generic_url: bool,
    /// HTTP status of the final response; absent when no response arrived.
    pub response_code: Option<u16>,
    /// Reason phrase, or a description of the failure.
    pub response_reason: String,
    /// Whether this fetch attempt failed.
    pub fetch_error: bool,
    /// Raw response body.
    pub resolved_text: String,
    /// Extracted article text.
    pub article_maintext: Option<String>,
    /// The entry point that produced the record.
    pub fetch_path: FetchPath,
    /// When the record was created.
    pub fetched_at: DateTime<Utc>,
    /// Caller-supplied fields carried through to the output.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentRecord {
    /// Creates an empty record. Extra keys that collide with record fields are dropped.
    #[must_use]
    pub fn new(
        original_url: impl Into<String>,
        fetch_path: FetchPath,
        extra: Map<String, Value>,
    ) -> Self {
        let extra = extra
            .into_iter()
            .filter(|(key, _)| {
                let collides = BASE_FIELDS.contains(&key.as_str());
                if collides {
                    debug!(key = %key, "dropping extra field that shadows a record field");
                }
                !collides
            })
            .collect();

        Self {
            original_url: original_url.into(),
            resolved_url: None,
            resolved_domain: None,
            resolved_netloc: String::new(),
            standardized_url: String::new(),
            is_generic_url: false,
            response_code: None,
            response_reason: String::new(),
            fetch_error: false,
            resolved_text: String::new(),
            article_maintext: None,
            fetch_path,
            fetched_at: Utc::now(),
            extra,
        }
    }

    /// Fills the derived fields: error flag, URL versions, generic indicator and article text.
    #[must_use]
    pub fn finish(mut self, extractor: &dyn ArticleExtractor) -> Self {
        self.fetch_error = self.compute_fetch_error();

        let resolved = self.resolved_url.as_deref().unwrap_or_default();
        self.resolved_netloc = standardize_url(resolved, StandardizeOptions::netloc_only());
        self.standardized_url = standardize_url(resolved, StandardizeOptions::default());
        self.is_generic_url = is_generic_url(resolved);

        self.article_maintext = if self.resolved_text.is_empty() {
            None
        } else {
            extractor.extract(&self.resolved_text, self.resolved_url.as_deref())
        };
        self
    }

    fn compute_fetch_error(&self) -> bool {
        match self.fetch_path {
            FetchPath::Active => self
                .resolved_url
                .as_deref()
                .is_none_or(|url| url.contains(UNPARSABLE_DOMAIN)),
            FetchPath::Archived => self.response_reason != ARCHIVE_OK_REASON,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fetch::article::ParagraphExtractor;

    fn extras(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_drops_colliding_extras() {
        let record = ContentRecord::new(
            "https://example.com/a",
            FetchPath::Active,
            extras(json!({"outlet": "CNN", "resolved_url": "spoofed", "fetch_error": true})),
        );
        assert_eq!(record.extra.len(), 1);
        assert_eq!(record.extra.get("outlet"), Some(&json!("CNN")));
    }

    #[test]
    fn test_serialization_flattens_extras() {
        let record = ContentRecord::new(
            "https://example.com/a",
            FetchPath::Archived,
            extras(json!({"outlet": "CNN"})),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["outlet"], json!("CNN"));
        assert_eq!(value["fetch_path"], json!("archived"));
        assert_eq!(value["response_code"], Value::Null);
        assert!(value["fetched_at"].as_str().unwrap().contains('T'));

        let back: ContentRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_active_fetch_error_on_marker() {
        let mut record = ContentRecord::new("https://example.com/a", FetchPath::Active, Map::new());
        record.resolved_url = Some("http://example.com/__CONNECTIONPOOL_ERROR__".to_string());
        let record = record.finish(&ParagraphExtractor);
        assert!(record.fetch_error);
    }

    #[test]
    fn test_active_fetch_error_when_unresolved() {
        let record = ContentRecord::new("https://example.com/a", FetchPath::Active, Map::new())
            .finish(&ParagraphExtractor);
        assert!(record.fetch_error);
        assert_eq!(record.standardized_url, "ERROR");
    }

    #[test]
    fn test_active_success_fills_url_versions() {
        let mut record = ContentRecord::new("https://bit.ly/x", FetchPath::Active, Map::new());
        record.resolved_url = Some("https://www.example.com/news/story?utm_source=t".to_string());
        record.resolved_text = "<p>Body text.</p>".to_string();
        let record = record.finish(&ParagraphExtractor);
        assert!(!record.fetch_error);
        assert_eq!(record.resolved_netloc, "www.example.com");
        assert_eq!(record.standardized_url, "www.example.com/news/story");
        assert!(!record.is_generic_url);
        assert_eq!(record.article_maintext.as_deref(), Some("Body text."));
    }

    #[test]
    fn test_archived_fetch_error_follows_reason() {
        let mut record =
            ContentRecord::new("https://example.com/", FetchPath::Archived, Map::new());
        record.resolved_url = Some("https://example.com/".to_string());
        record.response_reason = ARCHIVE_OK_REASON.to_string();
        let ok = record.clone().finish(&ParagraphExtractor);
        assert!(!ok.fetch_error);
        assert!(ok.is_generic_url);

        record.response_reason = "no archived snapshot".to_string();
        assert!(record.finish(&ParagraphExtractor).fetch_error);
    }
}
