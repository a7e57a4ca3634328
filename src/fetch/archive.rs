//! Web archive lookups.
//!
//! [`WaybackClient`] asks the Wayback Machine availability API for the
//! snapshot closest to 1996-01-01, which is the oldest one on record, and
//! then downloads that snapshot.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{Instrument, Span, debug, info_span};
use url::Url;

use crate::resolver::http_client::{self, DEFAULT_CONNECT_TIMEOUT};
use crate::resolver::utils::compile_static_regex;
use crate::resolver::{ClientBuildError, DEFAULT_CONTENT_TIMEOUT, RequestError};
use crate::user_agent;

/// Public Wayback Machine endpoint.
pub const DEFAULT_WAYBACK_BASE: &str = "https://archive.org";

/// Timestamp that makes "closest" mean "oldest".
const OLDEST_TIMESTAMP: &str = "19960101";

// `https://web.archive.org/web/20130919044612/` or `.../web/20130919044612id_/`
static ARCHIVE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^https?://[^/]+/web/\d+[a-z_]*/"));

/// An archived copy of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// URL of the snapshot inside the archive.
    pub archive_url: String,
    /// Snapshot body.
    pub body: String,
}

/// Archive lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    /// The archive holds no snapshot of the URL.
    #[error("no archived snapshot exists for {url}")]
    NotArchived {
        /// The URL looked up.
        url: String,
    },

    /// The URL cannot be submitted to the archive.
    #[error("malformed URL, cannot look up in archive: {url}")]
    MalformedUrl {
        /// The rejected URL.
        url: String,
    },

    /// The archive could not be reached or answered nonsense.
    #[error("archive unavailable: {reason}")]
    Unavailable {
        /// Failure description.
        reason: String,
    },
}

impl From<RequestError> for ArchiveError {
    fn from(error: RequestError) -> Self {
        Self::Unavailable {
            reason: error.to_string(),
        }
    }
}

/// Looks up archived copies of URLs.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Returns the oldest snapshot of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] when no snapshot can be retrieved.
    async fn oldest(&self, url: &str) -> Result<Snapshot, ArchiveError>;
}

/// Removes the archive's own prefix from a snapshot URL, leaving the archived URL.
#[must_use]
pub fn strip_archive_prefix(archive_url: &str) -> String {
    ARCHIVE_PREFIX_RE.replace(archive_url, "").into_owned()
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ClosestSnapshot {
    #[serde(default = "default_available")]
    available: bool,
    url: String,
}

fn default_available() -> bool {
    true
}

/// Wayback Machine client.
#[derive(Debug, Clone)]
pub struct WaybackClient {
    client: Client,
    api_base: String,
    timeout: Duration,
    span: Span,
}

impl WaybackClient {
    /// Creates a client for the public Wayback Machine.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, ClientBuildError> {
        let client = http_client::build_http_client(
            "wayback",
            &user_agent::default_user_agent(),
            DEFAULT_CONNECT_TIMEOUT,
        )?;
        Ok(Self::with_client(client))
    }

    /// Creates a client over an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_WAYBACK_BASE.to_string(),
            timeout: DEFAULT_CONTENT_TIMEOUT,
            span: info_span!("wayback"),
        }
    }

    /// Points the client at a different availability API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn lookup(&self, url: &str) -> Result<Snapshot, ArchiveError> {
        if !Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https")) {
            return Err(ArchiveError::MalformedUrl {
                url: url.to_string(),
            });
        }

        let endpoint = Url::parse_with_params(
            &format!("{}/wayback/available", self.api_base.trim_end_matches('/')),
            &[("url", url), ("timestamp", OLDEST_TIMESTAMP)],
        )
        .map_err(|error| ArchiveError::Unavailable {
            reason: format!("bad archive endpoint {}: {error}", self.api_base),
        })?;

        let response = self
            .client
            .get(endpoint.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| RequestError::from_reqwest(endpoint.as_str(), &error))?;
        if let Some(error) = RequestError::from_status(response.status(), endpoint.as_str()) {
            return Err(error.into());
        }
        let availability: AvailabilityResponse =
            response.json().await.map_err(|error| ArchiveError::Unavailable {
                reason: format!("unreadable availability response: {error}"),
            })?;

        let Some(closest) = availability
            .archived_snapshots
            .closest
            .filter(|closest| closest.available)
        else {
            return Err(ArchiveError::NotArchived {
                url: url.to_string(),
            });
        };
        debug!(snapshot = %closest.url, "found oldest snapshot");

        let response = self
            .client
            .get(&closest.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| RequestError::from_reqwest(&closest.url, &error))?;
        if let Some(error) = RequestError::from_status(response.status(), closest.url.as_str()) {
            return Err(error.into());
        }
        let body = response
            .text()
            .await
            .map_err(|error| RequestError::from_reqwest(&closest.url, &error))?;

        Ok(Snapshot {
            archive_url: closest.url,
            body,
        })
    }
}

#[async_trait]
impl ArchiveClient for WaybackClient {
    async fn oldest(&self, url: &str) -> Result<Snapshot, ArchiveError> {
        let span = info_span!(parent: &self.span, "oldest", url = %url);
        self.lookup(url).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_archive_prefix() {
        assert_eq!(
            strip_archive_prefix("http://web.archive.org/web/20130919044612/http://example.com/"),
            "http://example.com/"
        );
        assert_eq!(
            strip_archive_prefix(
                "https://web.archive.org/web/20010101000000id_/https://a.org/x?y=1"
            ),
            "https://a.org/x?y=1"
        );
        assert_eq!(strip_archive_prefix("https://a.org/x"), "https://a.org/x");
    }

    #[test]
    fn test_availability_response_without_snapshot() {
        let parsed: AvailabilityResponse =
            serde_json::from_str(r#"{"url": "x", "archived_snapshots": {}}"#)
                .unwrap_or_else(|error| panic!("parse failed: {error}"));
        assert!(parsed.archived_snapshots.closest.is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_rejected_before_request() {
        let client = WaybackClient::with_client(Client::new());
        let result = client.oldest("ERROR").await;
        assert_eq!(
            result,
            Err(ArchiveError::MalformedUrl {
                url: "ERROR".to_string()
            })
        );
    }
}
