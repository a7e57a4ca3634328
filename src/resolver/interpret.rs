//! Recovers a best-effort destination from the text of a failed request.
//!
//! A request that times out on the third redirect hop still tells us which
//! host the link was heading for. [`interpret_failure`] pulls that host (or
//! the URL behind an HTTP error status) out of the rendered error and builds
//! a synthetic endpoint that marks the URL as failed while keeping its domain.

use tracing::info;

use crate::domain::{Domain, domain_of};

/// Path marker for failures that never reached an HTTP response.
pub const CONNECTION_POOL_MARKER: &str = "__CONNECTIONPOOL_ERROR__";

/// Path marker for failures that ended on an HTTP error status.
pub const CLIENT_ERROR_MARKER: &str = "__CLIENT_ERROR__";

const CONNECTION_POOL_TOKEN: &str = "ConnectionPool";
const CONNECTION_POOL_HOST_PREFIX: &str = "ConnectionPool(host='";
const CLIENT_ERROR_TOKEN: &str = "Client Error: ";
const SERVER_ERROR_TOKEN: &str = "Server Error";
const FOR_URL_TOKEN: &str = " for url: ";

/// Which interpretation rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection or timeout failure naming a host.
    ConnectionPool,
    /// HTTP 4xx/5xx status naming a URL.
    HttpStatus,
    /// Nothing recognizable.
    Unknown,
}

/// Domain and synthetic endpoint recovered from an error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInterpretation {
    /// Recovered domain, or [`Domain::Unknown`].
    pub domain: Domain,
    /// Synthetic endpoint URL, absent for unknown failures.
    pub endpoint: Option<String>,
    /// The rule that matched.
    pub kind: FailureKind,
}

/// Interprets the text of a failed request.
///
/// Rules in priority order:
/// 1. `ConnectionPool(host='<host>', ...)`: the host verbatim, endpoint
///    `http://<host>/__CONNECTIONPOOL_ERROR__`.
/// 2. `Client Error: ` or `Server Error`: the domain of the URL after the
///    last ` for url: `, endpoint `http://<domain>/__CLIENT_ERROR__`.
/// 3. Anything else: [`Domain::Unknown`] and no endpoint.
#[must_use]
pub fn interpret_failure(error_text: &str) -> FailureInterpretation {
    if error_text.contains(CONNECTION_POOL_TOKEN)
        && let Some(host) = connection_pool_host(error_text)
    {
        info!(host, "connection pool error");
        return FailureInterpretation {
            domain: Domain::Name(host.to_string()),
            endpoint: Some(format!("http://{host}/{CONNECTION_POOL_MARKER}")),
            kind: FailureKind::ConnectionPool,
        };
    }

    if error_text.contains(CLIENT_ERROR_TOKEN) || error_text.contains(SERVER_ERROR_TOKEN) {
        let failed_url = error_text
            .rsplit(FOR_URL_TOKEN)
            .next()
            .unwrap_or(error_text)
            .trim();
        let domain = domain_of(failed_url);
        info!(url = failed_url, %domain, "client or server error");
        return FailureInterpretation {
            endpoint: Some(format!("http://{domain}/{CLIENT_ERROR_MARKER}")),
            domain,
            kind: FailureKind::HttpStatus,
        };
    }

    info!(error = error_text, "unknown error");
    FailureInterpretation {
        domain: Domain::Unknown,
        endpoint: None,
        kind: FailureKind::Unknown,
    }
}

fn connection_pool_host(error_text: &str) -> Option<&str> {
    let (_, rest) = error_text.split_once(CONNECTION_POOL_HOST_PREFIX)?;
    let host = rest.split('\'').next()?;
    (!host.is_empty()).then_some(host)
}
