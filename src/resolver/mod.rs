//! Single-URL resolution.
//!
//! [`UrlResolver`] follows redirects for one URL and always produces a
//! [`ResolutionResult`]. When the request fails, the failure text is handed to
//! [`interpret_failure`] to recover the host the link was heading for. The
//! result is then post-processed:
//!
//! - link-appender hosts (`linkis.com/www.example.com/...`) are stripped out
//!   of the resolved URL;
//! - ad-redirect hosts and uninterpretable failures go through the
//!   [`Unshortener`].
//!
//! # Example
//!
//! ```no_run
//! use expander_core::resolver::{ResolverConfig, UrlResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = UrlResolver::new(ResolverConfig::default())?;
//! let result = resolver.resolve_one("https://bit.ly/2yUVQDz").await;
//! println!("{:?} ({})", result.resolved_url, result.resolved_domain);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod http_client;
mod interpret;
mod unshorten;
pub(crate) mod utils;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::domain::{Domain, DomainLists, PostProcess, domain_of};
use crate::user_agent;

pub use error::{ClientBuildError, RequestError, ResolveError, UnshortenError};
pub use interpret::{
    CLIENT_ERROR_MARKER, CONNECTION_POOL_MARKER, FailureInterpretation, FailureKind,
    interpret_failure,
};
pub use unshorten::{BruteForceUnshortener, DEFAULT_MAX_HOPS, Unshortener};

/// Default per-request timeout for resolution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-request timeout for content requests.
pub const DEFAULT_CONTENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Random whole-second pause before content and archive requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    /// Lower bound in seconds, inclusive.
    pub min_secs: u64,
    /// Upper bound in seconds, inclusive.
    pub max_secs: u64,
}

impl Default for PolitenessDelay {
    fn default() -> Self {
        Self {
            min_secs: 8,
            max_secs: 12,
        }
    }
}

impl PolitenessDelay {
    /// A delay that never waits.
    #[must_use]
    pub fn none() -> Self {
        Self {
            min_secs: 0,
            max_secs: 0,
        }
    }

    /// Creates a delay range; the bounds are swapped if given in reverse.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// Draws one delay from the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max_secs == 0 {
            return Duration::ZERO;
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }

    /// Sleeps for one sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            debug!(delay_secs = delay.as_secs(), "politeness delay");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Per-request options for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Whole-request timeout, covering every redirect hop.
    pub timeout: Duration,
    /// Issue HEAD instead of GET.
    pub use_head: bool,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            use_head: true,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Chooses HEAD (`true`) or GET (`false`).
    #[must_use]
    pub fn with_head(mut self, use_head: bool) -> Self {
        self.use_head = use_head;
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn method(&self) -> Method {
        if self.use_head { Method::HEAD } else { Method::GET }
    }
}

/// Construction-time configuration for [`UrlResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TCP connect timeout of the shared client.
    pub connect_timeout: Duration,
    /// User agent of the shared client.
    pub user_agent: String,
    /// Domain lists driving post-processing.
    pub lists: DomainLists,
    /// Default options for [`UrlResolver::resolve_one`].
    pub request: RequestOptions,
    /// Timeout for [`UrlResolver::resolve_with_content`].
    pub content_timeout: Duration,
    /// Pause before each content request.
    pub content_delay: PolitenessDelay,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: http_client::DEFAULT_CONNECT_TIMEOUT,
            user_agent: user_agent::default_user_agent(),
            lists: DomainLists::default(),
            request: RequestOptions::default(),
            content_timeout: DEFAULT_CONTENT_TIMEOUT,
            content_delay: PolitenessDelay::default(),
        }
    }
}

impl ResolverConfig {
    /// Replaces the default request options.
    #[must_use]
    pub fn with_request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }

    /// Replaces the domain lists.
    #[must_use]
    pub fn with_lists(mut self, lists: DomainLists) -> Self {
        self.lists = lists;
        self
    }

    /// Sets the content request timeout.
    #[must_use]
    pub fn with_content_timeout(mut self, timeout: Duration) -> Self {
        self.content_timeout = timeout;
        self
    }

    /// Sets the pause before content requests.
    #[must_use]
    pub fn with_content_delay(mut self, delay: PolitenessDelay) -> Self {
        self.content_delay = delay;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Outcome of resolving one URL. This is also the cache record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The URL as given.
    pub original_url: String,
    /// Final destination or synthetic failure endpoint; `None` when nothing could be recovered.
    pub resolved_url: Option<String>,
    /// Domain of the destination.
    pub resolved_domain: Domain,
}

/// Outcome of [`UrlResolver::resolve_with_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResponse {
    /// The URL as given.
    pub original_url: String,
    /// URL of the final response, when a response arrived.
    pub response_url: Option<String>,
    /// Post-processed destination, or a synthetic failure endpoint.
    pub resolved_url: Option<String>,
    /// Domain of `resolved_url`.
    pub resolved_domain: Domain,
    /// Status code of the final response.
    pub response_code: Option<u16>,
    /// Reason phrase of the final response, or the failure text.
    pub response_reason: String,
    /// Response body, empty on failure.
    pub resolved_text: String,
}

/// Anything that can resolve a URL for the dispatcher.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolves one URL.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the URL should be dropped from the run.
    async fn resolve(&self, url: &str) -> Result<ResolutionResult, ResolveError>;
}

/// Redirect-following resolver with failure interpretation and post-processing.
#[derive(Clone)]
pub struct UrlResolver {
    client: Client,
    lists: Arc<DomainLists>,
    request: RequestOptions,
    content_timeout: Duration,
    content_delay: PolitenessDelay,
    unshortener: Arc<dyn Unshortener>,
    span: Span,
}

impl std::fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlResolver")
            .field("request", &self.request)
            .field("content_timeout", &self.content_timeout)
            .field("content_delay", &self.content_delay)
            .finish_non_exhaustive()
    }
}

impl UrlResolver {
    /// Creates a resolver with a [`BruteForceUnshortener`] sharing its client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the HTTP client cannot be built.
    pub fn new(config: ResolverConfig) -> Result<Self, ClientBuildError> {
        let client =
            http_client::build_http_client("resolver", &config.user_agent, config.connect_timeout)?;
        let unshortener = Arc::new(BruteForceUnshortener::new(client.clone()));
        Ok(Self {
            client,
            lists: Arc::new(config.lists),
            request: config.request,
            content_timeout: config.content_timeout,
            content_delay: config.content_delay,
            unshortener,
            span: info_span!("resolver"),
        })
    }

    /// Replaces the fallback unshortener.
    #[must_use]
    pub fn with_unshortener(mut self, unshortener: Arc<dyn Unshortener>) -> Self {
        self.unshortener = unshortener;
        self
    }

    /// Default request options.
    #[must_use]
    pub fn request_options(&self) -> &RequestOptions {
        &self.request
    }

    /// Domain lists in use.
    #[must_use]
    pub fn lists(&self) -> &DomainLists {
        &self.lists
    }

    /// Resolves `url` with the default request options.
    pub async fn resolve_one(&self, url: &str) -> ResolutionResult {
        self.resolve_with_options(url, &self.request).await
    }

    /// Resolves `url` with explicit request options. Never fails.
    pub async fn resolve_with_options(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> ResolutionResult {
        let span = info_span!(parent: &self.span, "resolve", url = %url);
        self.resolve_inner(url, options).instrument(span).await
    }

    async fn resolve_inner(&self, url: &str, options: &RequestOptions) -> ResolutionResult {
        let (resolved_url, domain) =
            match self.send(url, options.method(), options, options.timeout).await {
                Ok(response) => {
                    if let Some(error) =
                        RequestError::from_status(response.status(), response.url().as_str())
                    {
                        interpreted(&error)
                    } else {
                        let final_url = response.url().to_string();
                        let domain = domain_of(&final_url);
                        debug!(resolved = %final_url, "first expansion ok");
                        (Some(final_url), domain)
                    }
                }
                Err(error) => interpreted(&error),
            };

        let (resolved_url, resolved_domain) =
            self.post_process(url, resolved_url, domain, options.timeout).await;
        ResolutionResult {
            original_url: url.to_string(),
            resolved_url,
            resolved_domain,
        }
    }

    /// GETs `url` after the politeness delay and returns the post-processed
    /// destination together with the response status and body.
    pub async fn resolve_with_content(&self, url: &str) -> ContentResponse {
        self.resolve_with_content_timeout(url, self.content_timeout).await
    }

    /// [`Self::resolve_with_content`] with an explicit timeout.
    pub async fn resolve_with_content_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> ContentResponse {
        let span = info_span!(parent: &self.span, "resolve_with_content", url = %url);
        async {
            self.content_delay.wait().await;
            self.content_inner(url, timeout).await
        }
        .instrument(span)
        .await
    }

    async fn content_inner(&self, url: &str, timeout: Duration) -> ContentResponse {
        let mut content = ContentResponse {
            original_url: url.to_string(),
            response_url: None,
            resolved_url: None,
            resolved_domain: Domain::Unknown,
            response_code: None,
            response_reason: String::new(),
            resolved_text: String::new(),
        };

        let (resolved_url, domain) =
            match self.send(url, Method::GET, &self.request, timeout).await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();
                    content.response_url = Some(final_url.clone());
                    content.response_code = Some(status.as_u16());
                    content.response_reason =
                        status.canonical_reason().unwrap_or_default().to_string();
                    match response.text().await {
                        Ok(text) => content.resolved_text = text,
                        Err(error) => {
                            warn!(error = %error, "response body could not be read");
                        }
                    }
                    if let Some(error) = RequestError::from_status(status, final_url.as_str()) {
                        interpreted(&error)
                    } else {
                        let domain = domain_of(&final_url);
                        (Some(final_url), domain)
                    }
                }
                Err(error) => {
                    content.response_reason = error.to_string();
                    interpreted(&error)
                }
            };

        let (resolved_url, resolved_domain) =
            self.post_process(url, resolved_url, domain, timeout).await;
        content.resolved_url = resolved_url;
        content.resolved_domain = resolved_domain;
        content
    }

    async fn send(
        &self,
        url: &str,
        method: Method,
        options: &RequestOptions,
        timeout: Duration,
    ) -> Result<Response, RequestError> {
        let mut request = self.client.request(method, url).timeout(timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
            .send()
            .await
            .map_err(|error| RequestError::from_reqwest(url, &error))
    }

    async fn post_process(
        &self,
        original_url: &str,
        resolved_url: Option<String>,
        domain: Domain,
        timeout: Duration,
    ) -> (Option<String>, Domain) {
        match self.lists.post_process_for(&domain) {
            PostProcess::Accept => (resolved_url, domain),
            PostProcess::StripAppender(appender) => match resolved_url.as_deref() {
                Some(resolved) => {
                    let (stripped, stripped_domain) = strip_link_appender(resolved, appender);
                    debug!(appender, stripped = %stripped, "removed link appender");
                    (Some(stripped), stripped_domain)
                }
                None => (resolved_url, domain),
            },
            PostProcess::Unshorten => {
                match self.unshortener.unshorten(original_url, timeout).await {
                    Ok(unshortened) => {
                        let unshortened_domain = domain_of(&unshortened);
                        debug!(unshortened = %unshortened, "unshortener fallback succeeded");
                        (Some(unshortened), unshortened_domain)
                    }
                    Err(error) => {
                        warn!(error = %error, "unshortener fallback failed; keeping first result");
                        (resolved_url, domain)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Resolve for UrlResolver {
    async fn resolve(&self, url: &str) -> Result<ResolutionResult, ResolveError> {
        Ok(self.resolve_one(url).await)
    }
}

/// Removes every occurrence of `appender` from `resolved_url` and reclassifies the remainder.
#[must_use]
pub fn strip_link_appender(resolved_url: &str, appender: &str) -> (String, Domain) {
    let stripped = resolved_url.replace(appender, "");
    let domain = domain_of(&stripped);
    (stripped, domain)
}

fn interpreted(error: &RequestError) -> (Option<String>, Domain) {
    debug!(error = %error, "first expansion failed");
    let interpretation = interpret_failure(&error.to_string());
    (interpretation.endpoint, interpretation.domain)
}
