//! Integration tests for the resolver module.
//!
//! Tests redirect following, failure interpretation and post-processing
//! through the public API against local mock servers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use expander_core::resolver::{
    CLIENT_ERROR_MARKER, CONNECTION_POOL_MARKER, PolitenessDelay, RequestOptions, ResolverConfig,
    UnshortenError, Unshortener, UrlResolver, strip_link_appender,
};
use expander_core::{BruteForceUnshortener, Domain, Resolve};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Unshortener that records calls and answers with a fixed URL.
struct FixedUnshortener {
    answer: Result<String, ()>,
    calls: AtomicUsize,
}

impl FixedUnshortener {
    fn ok(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            answer: Err(()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Unshortener for FixedUnshortener {
    async fn unshorten(&self, url: &str, _timeout: Duration) -> Result<String, UnshortenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(|()| UnshortenError::InvalidUrl {
            url: url.to_string(),
        })
    }
}

fn resolver() -> UrlResolver {
    let config = ResolverConfig::default()
        .with_request(RequestOptions::default().with_timeout(Duration::from_secs(5)))
        .with_content_delay(PolitenessDelay::none());
    UrlResolver::new(config).unwrap()
}

#[tokio::test]
async fn test_resolve_follows_redirect_chain() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let final_url = format!("{}/story/final", server.uri());

    Mock::given(path("/s/abc"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/hop", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(path("/hop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", final_url.as_str()))
        .mount(&server)
        .await;
    Mock::given(path("/story/final"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let original = format!("{}/s/abc", server.uri());
    let result = resolver().resolve_one(&original).await;

    assert_eq!(result.original_url, original);
    assert_eq!(result.resolved_url.as_deref(), Some(final_url.as_str()));
    assert!(matches!(result.resolved_domain, Domain::Name(_)));
}

#[tokio::test]
async fn test_resolve_uses_head_by_default_and_get_on_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver();
    let url = format!("{}/page", server.uri());
    let head = resolver.resolve_one(&url).await;
    let get = resolver
        .resolve_with_options(&url, &RequestOptions::default().with_head(false))
        .await;

    assert_eq!(head.resolved_url.as_deref(), Some(url.as_str()));
    assert_eq!(get.resolved_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_resolve_sends_extra_headers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/needs-header"))
        .and(wiremock::matchers::header("x-research", "yes"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!("{}/needs-header", server.uri());
    let options = RequestOptions::default().with_header("x-research", "yes");
    let result = resolver().resolve_with_options(&url, &options).await;

    assert_eq!(result.resolved_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn test_resolve_client_error_yields_marker_endpoint() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let unshortener = Arc::new(FixedUnshortener::ok("https://never.example/"));
    let resolver = resolver().with_unshortener(unshortener.clone());
    let result = resolver.resolve_one(&format!("{}/gone", server.uri())).await;

    let resolved = result.resolved_url.unwrap();
    assert!(
        resolved.ends_with(&format!("/{CLIENT_ERROR_MARKER}")),
        "expected client error marker, got {resolved}"
    );
    assert!(!result.resolved_domain.is_unknown());
    assert_eq!(unshortener.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resolve_server_error_yields_marker_endpoint() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = resolver()
        .resolve_one(&format!("{}/down", server.uri()))
        .await;

    assert!(
        result
            .resolved_url
            .as_deref()
            .is_some_and(|url| url.ends_with(CLIENT_ERROR_MARKER))
    );
}

#[tokio::test]
async fn test_resolve_connection_refused_yields_connection_pool_endpoint() {
    let result = resolver().resolve_one("http://127.0.0.1:1/x").await;

    assert_eq!(
        result.resolved_url.as_deref(),
        Some(format!("http://127.0.0.1/{CONNECTION_POOL_MARKER}").as_str())
    );
    assert_eq!(result.resolved_domain, Domain::Name("127.0.0.1".to_string()));
}

#[tokio::test]
async fn test_resolve_redirect_loop_falls_back_to_unshortener() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/loop", server.uri())),
        )
        .mount(&server)
        .await;

    let unshortener = Arc::new(FixedUnshortener::ok(
        "https://www.nytimes.com/2020/01/01/story.html",
    ));
    let resolver = resolver().with_unshortener(unshortener.clone());
    let result = resolver.resolve_one(&format!("{}/loop", server.uri())).await;

    assert_eq!(unshortener.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        result.resolved_url.as_deref(),
        Some("https://www.nytimes.com/2020/01/01/story.html")
    );
    assert_eq!(result.resolved_domain, Domain::Name("nytimes.com".to_string()));
}

#[tokio::test]
async fn test_resolve_unshortener_failure_keeps_first_result() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/loop", server.uri())),
        )
        .mount(&server)
        .await;

    let unshortener = Arc::new(FixedUnshortener::failing());
    let resolver = resolver().with_unshortener(unshortener.clone());
    let result = resolver.resolve_one(&format!("{}/loop", server.uri())).await;

    assert_eq!(unshortener.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.resolved_url, None);
    assert_eq!(result.resolved_domain, Domain::Unknown);
}

#[tokio::test]
async fn test_resolve_trait_never_drops() {
    let resolver: Arc<dyn Resolve> = Arc::new(
        resolver().with_unshortener(Arc::new(FixedUnshortener::failing())),
    );
    let result = resolver.resolve("not a url").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_resolve_with_content_returns_body_and_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = "<html><title>Senate votes</title><p>The senate voted.</p></html>";

    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let url = format!("{}/article", server.uri());
    let content = resolver().resolve_with_content(&url).await;

    assert_eq!(content.original_url, url);
    assert_eq!(content.response_url.as_deref(), Some(url.as_str()));
    assert_eq!(content.resolved_url.as_deref(), Some(url.as_str()));
    assert_eq!(content.response_code, Some(200));
    assert_eq!(content.response_reason, "OK");
    assert_eq!(content.resolved_text, body);
}

#[tokio::test]
async fn test_resolve_with_content_records_error_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let content = resolver()
        .resolve_with_content(&format!("{}/missing", server.uri()))
        .await;

    assert_eq!(content.response_code, Some(404));
    assert_eq!(content.response_reason, "Not Found");
    assert_eq!(content.resolved_text, "not here");
    assert!(
        content
            .resolved_url
            .as_deref()
            .is_some_and(|url| url.ends_with(CLIENT_ERROR_MARKER))
    );
}

#[tokio::test]
async fn test_brute_force_unshortener_follows_meta_refresh() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let target = format!("{}/landing", server.uri());

    Mock::given(path("/ad"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><head><meta http-equiv="refresh" content="0; url={target}"></head></html>"#
        )))
        .mount(&server)
        .await;
    Mock::given(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>landed</p>"))
        .mount(&server)
        .await;

    let unshortener = BruteForceUnshortener::new(reqwest::Client::new());
    let result = unshortener
        .unshorten(&format!("{}/ad", server.uri()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(result, target);
}

#[tokio::test]
async fn test_brute_force_unshortener_follows_script_redirect() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(path("/interstitial"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>window.location.href = "/dest";</script>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(path("/dest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let unshortener = BruteForceUnshortener::new(reqwest::Client::new());
    let result = unshortener
        .unshorten(&format!("{}/interstitial", server.uri()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(result, format!("{}/dest", server.uri()));
}

#[test]
fn test_strip_link_appender_public_api() {
    let (stripped, domain) = strip_link_appender("http://ln.is/www.bbc.co.uk/news/x", "ln.is");
    assert_eq!(stripped, "http:///www.bbc.co.uk/news/x");
    assert_eq!(domain, Domain::Name("bbc.co.uk".to_string()));
}
