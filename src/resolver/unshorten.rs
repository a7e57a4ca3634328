//! Fallback unshortening for ad-redirect hosts and uninterpretable failures.
//!
//! [`BruteForceUnshortener`] fetches the link the way a browser would and then
//! follows client-side hops (meta refresh and `window.location` assignments)
//! that plain redirect-following misses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{Instrument, Span, debug, info_span};
use url::Url;

use super::error::{RequestError, UnshortenError};
use super::http_client::{BROWSER_HEADERS, BROWSER_USER_AGENT};
use super::utils::find_client_redirect;

/// Default number of client-side hops followed.
pub const DEFAULT_MAX_HOPS: usize = 5;

/// Turns a short or obfuscated URL into its destination.
#[async_trait]
pub trait Unshortener: Send + Sync {
    /// Returns the destination of `url`, spending at most `timeout` per request.
    ///
    /// # Errors
    ///
    /// Returns [`UnshortenError`] when no destination could be determined.
    async fn unshorten(&self, url: &str, timeout: Duration) -> Result<String, UnshortenError>;
}

/// Browser-impersonating unshortener that follows HTTP and client-side redirects.
#[derive(Debug, Clone)]
pub struct BruteForceUnshortener {
    client: Client,
    max_hops: usize,
    span: Span,
}

impl BruteForceUnshortener {
    /// Creates an unshortener over `client`.
    ///
    /// The client's own user agent is overridden per request with a browser one.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_hops: DEFAULT_MAX_HOPS,
            span: info_span!("unshortener"),
        }
    }

    /// Sets the client-side hop limit.
    #[must_use]
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    async fn fetch_page(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Url, String), RequestError> {
        let mut request = self
            .client
            .get(url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT);
        for (name, value) in BROWSER_HEADERS {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .await
            .map_err(|error| RequestError::from_reqwest(url, &error))?;
        let final_url = response.url().clone();
        if let Some(error) = RequestError::from_status(response.status(), final_url.as_str()) {
            return Err(error);
        }
        let body = response
            .text()
            .await
            .map_err(|error| RequestError::from_reqwest(final_url.as_str(), &error))?;
        Ok((final_url, body))
    }

    async fn follow(&self, url: &str, timeout: Duration) -> Result<String, UnshortenError> {
        if !Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https")) {
            return Err(UnshortenError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let (mut current, mut body) = self.fetch_page(url, timeout).await?;
        for hop in 0..self.max_hops {
            let Some(next) = find_client_redirect(&body, &current) else {
                break;
            };
            if next == current.as_str() {
                break;
            }
            debug!(hop, next = %next, "following client-side redirect");
            match self.fetch_page(&next, timeout).await {
                Ok((landed, landed_body)) => {
                    current = landed;
                    body = landed_body;
                }
                Err(error) => {
                    // The hop target is still the best answer available.
                    debug!(error = %error, "client-side hop failed");
                    return Ok(next);
                }
            }
        }
        Ok(current.to_string())
    }
}

#[async_trait]
impl Unshortener for BruteForceUnshortener {
    async fn unshorten(&self, url: &str, timeout: Duration) -> Result<String, UnshortenError> {
        let span = info_span!(parent: &self.span, "unshorten", url = %url);
        self.follow(url, timeout).instrument(span).await
    }
}
