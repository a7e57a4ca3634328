//! Live and archived content fetching.
//!
//! A [`Fetcher`] turns a [`FetchRequest`] into a [`ContentRecord`] by one of
//! two paths:
//!
//! - **active**: resolve the URL on the live web and keep the response body;
//! - **archived**: look up the oldest web-archive snapshot of the URL.
//!
//! [`Fetcher::fetch`] tries the live web first and falls back to the archive
//! when the live attempt failed. Failed attempts still produce records, with
//! `fetch_error` set.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use expander_core::fetch::{FetchConfig, FetchRequest, Fetcher, WaybackClient};
//! use expander_core::resolver::{ResolverConfig, UrlResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = UrlResolver::new(ResolverConfig::default())?;
//! let fetcher = Fetcher::new(resolver, Arc::new(WaybackClient::new()?), FetchConfig::default());
//! let record = fetcher
//!     .fetch(&FetchRequest::new("https://bit.ly/2yUVQDz").with_extra("outlet", "CNN"))
//!     .await;
//! println!("{} -> {:?}", record.original_url, record.resolved_url);
//! # Ok(())
//! # }
//! ```

mod archive;
mod article;
mod record;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::cache::{CacheError, CacheStore};
use crate::domain::domain_of;
use crate::normalize::{StandardizeOptions, standardize_url};
use crate::resolver::{DEFAULT_CONTENT_TIMEOUT, PolitenessDelay, UrlResolver};

pub use archive::{
    ArchiveClient, ArchiveError, DEFAULT_WAYBACK_BASE, Snapshot, WaybackClient,
    strip_archive_prefix,
};
pub use article::{ArticleExtractor, ParagraphExtractor};
pub use record::{ARCHIVE_OK_REASON, ContentRecord, FetchPath};

/// Errors from batch fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A request object had no string `url` field.
    #[error("fetch request has no \"url\" field: {0}")]
    MissingUrl(Value),

    /// Reading or writing the record file failed.
    #[error("record file error: {0}")]
    Cache(#[from] CacheError),
}

/// Which path(s) a fetch takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Live web only.
    Live,
    /// Web archive only.
    Archived,
    /// Live web, then the archive when the live attempt failed.
    #[default]
    LiveThenArchive,
}

/// How [`Fetcher::fetch_many_to_file`] treats an existing output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Keep existing records and add new ones after them.
    #[default]
    Append,
    /// Discard existing records first.
    Truncate,
}

/// Timeouts and delays for fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Timeout for the live content request.
    pub timeout: Duration,
    /// Pause before each archive lookup.
    pub archive_delay: PolitenessDelay,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONTENT_TIMEOUT,
            archive_delay: PolitenessDelay::default(),
        }
    }
}

impl FetchConfig {
    /// Sets the live request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pause before archive lookups.
    #[must_use]
    pub fn with_archive_delay(mut self, delay: PolitenessDelay) -> Self {
        self.archive_delay = delay;
        self
    }
}

/// A URL to fetch plus caller fields to carry into its record.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// The URL to fetch.
    pub url: String,
    /// Extra fields copied into the record.
    pub extra: Map<String, Value>,
}

impl FetchRequest {
    /// Creates a request with no extra fields.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Adds an extra field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Builds a request from a JSON object with a string `url` key; the other keys become extras.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingUrl`] when `value` is not an object with a string `url`.
    pub fn from_value(value: Value) -> Result<Self, FetchError> {
        let Value::Object(mut object) = value else {
            return Err(FetchError::MissingUrl(value));
        };
        match object.remove("url") {
            Some(Value::String(url)) => Ok(Self { url, extra: object }),
            Some(other) => {
                object.insert("url".to_string(), other);
                Err(FetchError::MissingUrl(Value::Object(object)))
            }
            None => Err(FetchError::MissingUrl(Value::Object(object))),
        }
    }
}

/// Fetches page content, live or archived.
pub struct Fetcher {
    resolver: UrlResolver,
    archive: Arc<dyn ArchiveClient>,
    extractor: Arc<dyn ArticleExtractor>,
    config: FetchConfig,
    span: Span,
}

impl Fetcher {
    /// Creates a fetcher with the [`ParagraphExtractor`].
    #[must_use]
    pub fn new(
        resolver: UrlResolver,
        archive: Arc<dyn ArchiveClient>,
        config: FetchConfig,
    ) -> Self {
        Self {
            resolver,
            archive,
            extractor: Arc::new(ParagraphExtractor),
            config,
            span: info_span!("fetcher"),
        }
    }

    /// Replaces the article extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn ArticleExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Fetches from the live web.
    pub async fn fetch_live(&self, request: &FetchRequest) -> ContentRecord {
        let span = info_span!(parent: &self.span, "fetch_live", url = %request.url);
        async {
            let response = self
                .resolver
                .resolve_with_content_timeout(&request.url, self.config.timeout)
                .await;

            let mut record =
                ContentRecord::new(&request.url, FetchPath::Active, request.extra.clone());
            record.resolved_url = response.resolved_url;
            record.resolved_domain = Some(response.resolved_domain);
            record.response_code = response.response_code;
            record.response_reason = response.response_reason;
            record.resolved_text = response.resolved_text;
            let record = record.finish(self.extractor.as_ref());
            if record.fetch_error {
                warn!(reason = %record.response_reason, "live fetch failed");
            }
            record
        }
        .instrument(span)
        .await
    }

    /// Fetches the oldest archived snapshot.
    pub async fn fetch_archived(&self, request: &FetchRequest) -> ContentRecord {
        let span = info_span!(parent: &self.span, "fetch_archived", url = %request.url);
        async {
            let mut record =
                ContentRecord::new(&request.url, FetchPath::Archived, request.extra.clone());
            let target = standardize_url(&request.url, StandardizeOptions::for_archive());

            self.config.archive_delay.wait().await;
            match self.archive.oldest(&target).await {
                Ok(snapshot) => {
                    let resolved = strip_archive_prefix(&snapshot.archive_url);
                    record.resolved_domain = Some(domain_of(&resolved));
                    record.resolved_url = Some(resolved);
                    record.resolved_text = snapshot.body;
                    record.response_code = Some(200);
                    record.response_reason = ARCHIVE_OK_REASON.to_string();
                }
                Err(error) => {
                    warn!(error = %error, "archive fetch failed");
                    record.response_reason = error.to_string();
                }
            }
            record.finish(self.extractor.as_ref())
        }
        .instrument(span)
        .await
    }

    /// Fetches live, falling back to the archive when the live record has `fetch_error`.
    pub async fn fetch(&self, request: &FetchRequest) -> ContentRecord {
        self.fetch_with_mode(request, FetchMode::LiveThenArchive).await
    }

    /// Fetches by the given mode.
    pub async fn fetch_with_mode(&self, request: &FetchRequest, mode: FetchMode) -> ContentRecord {
        match mode {
            FetchMode::Live => self.fetch_live(request).await,
            FetchMode::Archived => self.fetch_archived(request).await,
            FetchMode::LiveThenArchive => {
                let live = self.fetch_live(request).await;
                if live.fetch_error {
                    info!(parent: &self.span, url = %request.url, "falling back to archive");
                    self.fetch_archived(request).await
                } else {
                    live
                }
            }
        }
    }

    /// Lazily fetches `requests` one at a time, in order.
    pub fn fetch_many<'a, I>(
        &'a self,
        requests: I,
        mode: FetchMode,
    ) -> impl Stream<Item = ContentRecord> + 'a
    where
        I: IntoIterator<Item = FetchRequest>,
        I::IntoIter: 'a,
    {
        stream::iter(requests).enumerate().then(move |(index, request)| async move {
            info!(parent: &self.span, index, url = %request.url, "fetching");
            self.fetch_with_mode(&request, mode).await
        })
    }

    /// Fetches `requests` and writes one JSON line per record to `path`.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Cache`] when the output file cannot be written.
    pub async fn fetch_many_to_file<I>(
        &self,
        requests: I,
        mode: FetchMode,
        path: &Path,
        write_mode: WriteMode,
    ) -> Result<usize, FetchError>
    where
        I: IntoIterator<Item = FetchRequest>,
    {
        let store: CacheStore<ContentRecord> = CacheStore::new(path);
        if write_mode == WriteMode::Truncate {
            store.truncate().await?;
        }

        let records = self.fetch_many(requests, mode);
        futures_util::pin_mut!(records);
        let mut written = 0;
        while let Some(record) = records.next().await {
            store.append(&record).await?;
            written += 1;
        }
        info!(parent: &self.span, written, path = %path.display(), "fetch output written");
        Ok(written)
    }
}

/// Parses JSON values into requests, skipping (and logging) those without a `url`.
pub fn requests_from_values(values: impl IntoIterator<Item = Value>) -> Vec<FetchRequest> {
    values
        .into_iter()
        .filter_map(|value| match FetchRequest::from_value(value) {
            Ok(request) => Some(request),
            Err(error) => {
                error!(error = %error, "skipping fetch request");
                None
            }
        })
        .collect()
}

/// Reads records written by [`Fetcher::fetch_many_to_file`].
///
/// # Errors
///
/// Returns [`FetchError::Cache`] when the file exists but cannot be read.
pub async fn load_fetched(path: &Path) -> Result<Vec<ContentRecord>, FetchError> {
    Ok(CacheStore::<ContentRecord>::new(path).load().await?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_fetch_request_from_value() {
        let request = FetchRequest::from_value(json!({"url": "https://a.org/x", "outlet": "CNN"}));
        assert_eq!(
            request.ok(),
            Some(FetchRequest::new("https://a.org/x").with_extra("outlet", "CNN"))
        );
    }

    #[test]
    fn test_fetch_request_missing_url() {
        assert!(matches!(
            FetchRequest::from_value(json!({"link": "https://a.org/x"})),
            Err(FetchError::MissingUrl(_))
        ));
        assert!(matches!(
            FetchRequest::from_value(json!({"url": 5})),
            Err(FetchError::MissingUrl(_))
        ));
        assert!(matches!(
            FetchRequest::from_value(json!("https://a.org/x")),
            Err(FetchError::MissingUrl(_))
        ));
    }

    #[test]
    fn test_requests_from_values_skips_invalid() {
        let requests = requests_from_values(vec![
            json!({"url": "https://a.org/1"}),
            json!({"nope": true}),
            json!({"url": "https://a.org/2", "id": 7}),
        ]);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].extra.get("id"), Some(&json!(7)));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FetchMode::default(), FetchMode::LiveThenArchive);
        assert_eq!(WriteMode::default(), WriteMode::Append);
        let config = FetchConfig::default();
        assert_eq!(config.archive_delay, PolitenessDelay::new(8, 12));
    }
}
