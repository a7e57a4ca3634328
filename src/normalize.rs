//! URL standardization and generic-URL detection.
//!
//! [`standardize_url`] canonicalizes a URL (sorted query, tracking
//! parameters removed, Google AMP prefix stripped) and then drops whichever
//! components [`StandardizeOptions`] asks for. The result is a comparison
//! key, not necessarily a valid URL.
//!
//! # Example
//!
//! ```
//! use expander_core::normalize::{StandardizeOptions, is_generic_url, standardize_url};
//!
//! let key = standardize_url(
//!     "https://www.Example.com/story?utm_source=x&b=2&a=1#top",
//!     StandardizeOptions::default(),
//! );
//! assert_eq!(key, "www.example.com/story?a=1&b=2");
//! assert!(is_generic_url("https://www.cnn.com/"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::domain::{UNPARSABLE_DOMAIN, domain_of};
use crate::resolver::utils::compile_static_regex;

/// Query parameters added by campaign and analytics tooling.
pub const ANALYTICS_PARAMETERS: &[&str] = &[
    // Google Analytics
    "utm_campaign",
    "utm_medium",
    "utm_source",
    "utm_term",
    "utm_content",
    "__twitter_impression",
    "fbclid",
    "amp",
    "camp",
    "cid",
    "cmpid",
    "custom_click",
    "dkt_nbr",
    "ns_mail_job",
    "ns_mail_uid",
    "can_id",
    "email_referrer",
    "email_subject",
    "link_id",
    "source",
    "platform",
    "_amp",
    // HubSpot
    "hsa_ol",
    "hsa_la",
    "hsa_cam",
    "hsa_grp",
    "hsa_mt",
    "hsa_src",
    "hsa_ad",
    "hsa_acc",
    "hsa_net",
    "hsa_kw",
    "hsa_tgt",
    "hsa_ver",
    "__hssc",
    "__hstc",
    "hsCtaTracking",
    "_hsenc",
    "_hsmi",
    "hss_channel",
];

static AMP_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^https?://www\.google\.com/amp/s/"));

/// Which components [`standardize_url`] removes or rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StandardizeOptions {
    /// Drop `http`/`https` (and the `//` that follows it).
    pub remove_scheme: bool,
    /// Replace the host with its registrable domain.
    pub replace_netloc_with_domain: bool,
    /// Drop the path.
    pub remove_path: bool,
    /// Drop the query string.
    pub remove_query: bool,
    /// Drop the fragment.
    pub remove_fragment: bool,
    /// Lowercase the final string.
    pub to_lowercase: bool,
}

impl Default for StandardizeOptions {
    fn default() -> Self {
        Self {
            remove_scheme: true,
            replace_netloc_with_domain: false,
            remove_path: false,
            remove_query: false,
            remove_fragment: true,
            to_lowercase: true,
        }
    }
}

impl StandardizeOptions {
    /// Keeps only the host: the comparison base for [`is_generic_url`].
    #[must_use]
    pub fn netloc_only() -> Self {
        Self {
            remove_path: true,
            remove_query: true,
            ..Self::default()
        }
    }

    /// Keeps scheme, path, query and case: the form submitted to web archives.
    #[must_use]
    pub fn for_archive() -> Self {
        Self {
            remove_scheme: false,
            to_lowercase: false,
            ..Self::default()
        }
    }
}

/// Returns the standardized form of `url`, or `"ERROR"` if it cannot be parsed.
///
/// Input without a scheme is read as `http://`.
#[must_use]
pub fn standardize_url(url: &str, options: StandardizeOptions) -> String {
    if let Some(standardized) = try_standardize(url, options) {
        standardized
    } else {
        debug!(url, "URL could not be standardized");
        UNPARSABLE_DOMAIN.to_string()
    }
}

/// Returns true if `url` points at a site's front page rather than a specific resource.
#[must_use]
pub fn is_generic_url(url: &str) -> bool {
    let standardized = standardize_url(url, StandardizeOptions::default());
    let base = standardize_url(url, StandardizeOptions::netloc_only());
    standardized != UNPARSABLE_DOMAIN && base != UNPARSABLE_DOMAIN && standardized == base
}

fn try_standardize(url: &str, options: StandardizeOptions) -> Option<String> {
    let mut parsed = parse_lenient(url)?;
    clean_query(&mut parsed);

    if let Some(rest) = AMP_PREFIX_RE.find(parsed.as_str()).map(|m| m.end()) {
        let target = parsed.as_str()[rest..].to_string();
        parsed = Url::parse(&format!("https://{target}")).ok()?;
    }

    let mut netloc = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    if options.replace_netloc_with_domain {
        netloc = domain_of(parsed.as_str()).to_string();
    }

    let mut link = String::new();
    if !options.remove_scheme {
        link.push_str(parsed.scheme());
        link.push(':');
    }
    if !netloc.is_empty() {
        link.push_str("//");
        link.push_str(&netloc);
    }
    if !options.remove_path {
        link.push_str(parsed.path());
    }
    if !options.remove_query
        && let Some(query) = parsed.query()
    {
        link.push('?');
        link.push_str(query);
    }
    if !options.remove_fragment
        && let Some(fragment) = parsed.fragment()
    {
        link.push('#');
        link.push_str(fragment);
    }

    if options.remove_scheme
        && let Some(stripped) = link.strip_prefix("//")
    {
        link = stripped.to_string();
    }
    if link.ends_with('/') {
        link.pop();
    }
    if options.to_lowercase {
        link = link.to_lowercase();
    }
    Some(link)
}

fn parse_lenient(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => Some(parsed),
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{trimmed}")).ok()
        }
        Err(_) => None,
    }
}

/// Sorts query pairs and removes analytics parameters.
fn clean_query(url: &mut Url) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !ANALYTICS_PARAMETERS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_defaults_drop_scheme_and_fragment() {
        assert_eq!(
            standardize_url(
                "https://www.nytimes.com/2016/x.html#section",
                StandardizeOptions::default()
            ),
            "www.nytimes.com/2016/x.html"
        );
    }

    #[test]
    fn test_standardize_removes_analytics_and_sorts_query() {
        assert_eq!(
            standardize_url(
                "http://example.com/a?utm_source=tw&z=1&fbclid=abc&b=2",
                StandardizeOptions::default()
            ),
            "example.com/a?b=2&z=1"
        );
    }

    #[test]
    fn test_standardize_strips_trailing_slash() {
        assert_eq!(
            standardize_url("https://www.cnn.com/", StandardizeOptions::default()),
            "www.cnn.com"
        );
    }

    #[test]
    fn test_standardize_strips_google_amp_prefix() {
        assert_eq!(
            standardize_url(
                "https://www.google.com/amp/s/www.example.com/story",
                StandardizeOptions::default()
            ),
            "www.example.com/story"
        );
    }

    #[test]
    fn test_standardize_replace_netloc_with_domain() {
        let options = StandardizeOptions {
            replace_netloc_with_domain: true,
            ..StandardizeOptions::default()
        };
        assert_eq!(
            standardize_url("https://amp.dailycaller.com/2020/story", options),
            "dailycaller.com/2020/story"
        );
    }

    #[test]
    fn test_standardize_for_archive_keeps_scheme_and_case() {
        assert_eq!(
            standardize_url(
                "https://Example.com/Path?utm_medium=x",
                StandardizeOptions::for_archive()
            ),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_standardize_keeps_fragment_when_asked() {
        let options = StandardizeOptions {
            remove_fragment: false,
            ..StandardizeOptions::default()
        };
        assert_eq!(
            standardize_url("https://example.com/a#Top", options),
            "example.com/a#top"
        );
    }

    #[test]
    fn test_standardize_without_scheme() {
        assert_eq!(
            standardize_url("cnn.com/politics", StandardizeOptions::default()),
            "cnn.com/politics"
        );
    }

    #[test]
    fn test_standardize_unparsable() {
        assert_eq!(
            standardize_url("http://", StandardizeOptions::default()),
            "ERROR"
        );
        assert_eq!(
            standardize_url("mailto:someone@example.com", StandardizeOptions::default()),
            "ERROR"
        );
    }

    #[test]
    fn test_is_generic_url() {
        assert!(is_generic_url("https://www.cnn.com/"));
        assert!(is_generic_url("cnn.com"));
        assert!(is_generic_url("https://www.cnn.com/?utm_source=twitter"));
        assert!(!is_generic_url("https://www.cnn.com/2020/politics/story"));
        assert!(!is_generic_url("https://www.cnn.com/?page=2"));
        assert!(!is_generic_url("not a url"));
    }
}
