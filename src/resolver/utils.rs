//! Shared utilities for the resolver: static regexes, URL joining and host/port extraction.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// `<meta http-equiv="refresh" content="0; url=...">` target.
pub static META_REFRESH_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<meta\s+[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*content\s*=\s*["']?\s*\d*\s*;?\s*url\s*=\s*['"]?([^"'>\s]+)"#,
    )
});

/// `window.location = "..."` / `location.href = '...'` style script redirects.
pub static JS_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)(?:window\.|document\.|top\.)?location(?:\.href)?\s*=\s*["']([^"']+)["']"#,
    )
});

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Returns the first capture of `regex` in `html`, trimmed.
#[must_use]
pub fn extract_meta_value(html: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(html)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
}

/// Returns the next client-side redirect target found in `html`, made absolute.
///
/// Meta refresh takes precedence over script redirects.
#[must_use]
pub fn find_client_redirect(html: &str, base_url: &Url) -> Option<String> {
    extract_meta_value(html, &META_REFRESH_RE)
        .or_else(|| extract_meta_value(html, &JS_LOCATION_RE))
        .map(|target| html_escape::decode_html_entities(&target).into_owned())
        .and_then(|target| absolutize_url(&target, base_url))
}

/// Host, port and path-with-query of `url`, or `None` if it does not parse to a host.
#[must_use]
pub fn host_port_path(url: &str) -> Option<(String, u16, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);
    let mut path = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        path.push('?');
        path.push_str(query);
    }
    Some((host, port, path))
}
