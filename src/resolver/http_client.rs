//! Shared HTTP client construction for resolution and content requests.
//!
//! Centralizes networking defaults so resolution, unshortening and archive
//! lookups agree on connect timeout, user agent, compression, redirect limit
//! and proxy compatibility. Per-request timeouts are set on each request.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use super::error::ClientBuildError;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of HTTP redirects followed per request.
pub const MAX_REDIRECTS: usize = 30;

/// Browser-like headers for hosts that serve interstitials to unknown clients.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,*"),
];

/// Browser user agent sent alongside [`BROWSER_HEADERS`].
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/53.0.2785.143 Safari/537.36";

/// Builds an HTTP client with the shared policy.
///
/// `purpose` is only used in the proxy-fallback log line.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when client construction fails.
pub fn build_http_client(
    purpose: &str,
    user_agent: &str,
    connect_timeout: Duration,
) -> Result<Client, ClientBuildError> {
    match try_build_client(user_agent, connect_timeout, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some restricted sandbox environments panic when querying system
            // proxy settings. The fallback keeps env-proxy support while
            // bypassing the system lookup.
            warn!(
                purpose,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(user_agent, connect_timeout, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(ClientBuildError::Panicked),
                Err(BuildClientFailure::Build(error)) => Err(ClientBuildError::Build(error)),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ClientBuildError::Build(error)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    connect_timeout: Duration,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, connect_timeout);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, connect_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .user_agent(user_agent)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
