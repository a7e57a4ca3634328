//! Error types for the resolver module.
//!
//! [`RequestError`] renders transport failures and HTTP error statuses in the
//! exact textual form that [`super::interpret_failure`] understands, so a
//! failed request can still point at the host it was trying to reach.

use reqwest::StatusCode;
use thiserror::Error;

use super::utils::host_port_path;

/// A failed HTTP attempt, rendered for failure interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The connection could not be established or timed out.
    #[error(
        "ConnectionPool(host='{host}', port={port}): Max retries exceeded with url: {path} (Caused by {reason})"
    )]
    ConnectionPool {
        /// Host of the request that failed, possibly a later redirect hop.
        host: String,
        /// Port of that request.
        port: u16,
        /// Path and query of that request.
        path: String,
        /// Underlying failure description.
        reason: String,
    },

    /// The final response had a 4xx status.
    #[error("{status} Client Error: {reason} for url: {url}")]
    ClientStatus {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// URL of the response that carried the status.
        url: String,
    },

    /// The final response had a 5xx status.
    #[error("{status} Server Error: {reason} for url: {url}")]
    ServerStatus {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// URL of the response that carried the status.
        url: String,
    },

    /// The final response had a status outside 2xx, 4xx and 5xx.
    #[error("unexpected status {status} {reason} from {url}")]
    UnexpectedStatus {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// URL of the response that carried the status.
        url: String,
    },

    /// The URL could not be turned into a request.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other failure: redirect loops, body decoding and the like.
    #[error("request to {url} failed: {reason}")]
    Other {
        /// URL of the failed request.
        url: String,
        /// Failure description.
        reason: String,
    },
}

impl RequestError {
    /// Maps a non-2xx status to an error. Returns `None` for success statuses.
    #[must_use]
    pub fn from_status(status: StatusCode, url: impl Into<String>) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        let code = status.as_u16();
        let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        let url = url.into();
        Some(if status.is_client_error() {
            Self::ClientStatus {
                status: code,
                reason,
                url,
            }
        } else if status.is_server_error() {
            Self::ServerStatus {
                status: code,
                reason,
                url,
            }
        } else {
            Self::UnexpectedStatus {
                status: code,
                reason,
                url,
            }
        })
    }

    /// Classifies a reqwest failure for the request that was sent to `requested_url`.
    ///
    /// The URL attached to the reqwest error wins over `requested_url`, since it
    /// names the redirect hop that actually failed.
    #[must_use]
    pub fn from_reqwest(requested_url: &str, error: &reqwest::Error) -> Self {
        let failing_url = error
            .url()
            .map_or_else(|| requested_url.to_string(), ToString::to_string);
        let reason = error_chain(error);

        if error.is_builder() {
            return Self::InvalidUrl {
                url: requested_url.to_string(),
                reason,
            };
        }
        if error.is_redirect() {
            return Self::Other {
                url: failing_url,
                reason,
            };
        }
        if (error.is_timeout() || error.is_connect())
            && let Some((host, port, path)) = host_port_path(&failing_url)
        {
            let reason = if error.is_timeout() {
                format!("timed out: {reason}")
            } else {
                reason
            };
            return Self::ConnectionPool {
                host,
                port,
                path,
                reason,
            };
        }
        Self::Other {
            url: failing_url,
            reason,
        }
    }
}

/// Joins an error and its sources into one line.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.contains(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}

/// Error returned by a [`super::Resolve`] implementation for a work item.
///
/// The built-in [`super::UrlResolver`] never returns one; custom resolvers
/// use it to have an item dropped from a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resolving {url} failed: {message}")]
pub struct ResolveError {
    /// The URL being resolved.
    pub url: String,
    /// Failure description.
    pub message: String,
}

impl ResolveError {
    /// Creates a resolve error.
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Errors from the brute-force unshortener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnshortenError {
    /// The first hop could not be fetched at all.
    #[error("unshortening failed: {0}")]
    Request(#[from] RequestError),

    /// The input is not an absolute http(s) URL.
    #[error("cannot unshorten non-HTTP URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },
}

/// Errors building the shared HTTP client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// reqwest rejected the client configuration.
    #[error("HTTP client construction failed: {0}")]
    Build(#[source] reqwest::Error),

    /// Networking initialization panicked, even with the env-proxy fallback.
    #[error("HTTP client construction panicked while initializing networking")]
    Panicked,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_client_error_text() {
        let error =
            RequestError::from_status(StatusCode::NOT_FOUND, "http://example.com/x").unwrap();
        assert_eq!(
            error.to_string(),
            "404 Client Error: Not Found for url: http://example.com/x"
        );
    }

    #[test]
    fn test_from_status_server_error_text() {
        let error =
            RequestError::from_status(StatusCode::BAD_GATEWAY, "https://example.org/").unwrap();
        assert_eq!(
            error.to_string(),
            "502 Server Error: Bad Gateway for url: https://example.org/"
        );
    }

    #[test]
    fn test_from_status_success_is_none() {
        assert_eq!(RequestError::from_status(StatusCode::OK, "http://a.b/"), None);
    }

    #[test]
    fn test_from_status_redirect_has_no_markers() {
        let error =
            RequestError::from_status(StatusCode::NOT_MODIFIED, "http://example.com/").unwrap();
        let text = error.to_string();
        assert!(!text.contains("Client Error"));
        assert!(!text.contains("Server Error"));
        assert!(!text.contains("ConnectionPool"));
    }

    #[test]
    fn test_connection_pool_text() {
        let error = RequestError::ConnectionPool {
            host: "bit.ly".to_string(),
            port: 443,
            path: "/abc".to_string(),
            reason: "timed out".to_string(),
        };
        assert!(
            error
                .to_string()
                .starts_with("ConnectionPool(host='bit.ly', port=443):")
        );
    }

    #[test]
    fn test_error_chain_skips_repeated_text() {
        let inner = std::io::Error::other("connection refused");
        assert_eq!(error_chain(&inner), "connection refused");
    }
}
