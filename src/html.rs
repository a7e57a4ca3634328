//! Regex-based scraping of page title, description, paragraphs and image.
//!
//! The helpers match the literal markup most news sites emit and return
//! `None` (or an empty list) for anything else.
//! Every value is HTML-entity decoded.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::resolver::utils::{compile_static_regex, extract_meta_value};

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<title>(.*?)</title>"));

static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<meta property="og?:description" content="(.*?)>"#)
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<meta property="og?:image" content="(.*?)>"#)
});

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"<p>(.*?)</p>"));

/// Title, description and image of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// The URL the HTML was fetched from.
    pub url: String,
    /// Contents of `<title>`.
    pub title: Option<String>,
    /// Contents of the `og:description` meta tag.
    pub description: Option<String>,
    /// Contents of the `og:image` meta tag.
    pub image_url: Option<String>,
}

/// Returns the page title.
#[must_use]
pub fn search_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| decode(m.as_str()))
}

/// Returns the `og:description` meta content.
#[must_use]
pub fn search_description(html: &str) -> Option<String> {
    search_meta_content(html, &DESCRIPTION_RE)
}

/// Returns the `og:image` meta content.
#[must_use]
pub fn search_image(html: &str) -> Option<String> {
    search_meta_content(html, &IMAGE_RE)
}

/// Returns the inner HTML of every single-line `<p>…</p>` element, in document order.
#[must_use]
pub fn search_paragraphs(html: &str) -> Vec<String> {
    PARAGRAPH_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode(m.as_str()))
        .collect()
}

/// Collects title, description and image into one record.
#[must_use]
pub fn search_meta(url: &str, html: &str) -> PageMeta {
    PageMeta {
        url: url.to_string(),
        title: search_title(html),
        description: search_description(html),
        image_url: search_image(html),
    }
}

// The capture runs up to the tag's closing `>`, so the closing quote and any
// self-closing slash are trimmed off here.
fn search_meta_content(html: &str, regex: &Regex) -> Option<String> {
    let raw = extract_meta_value(html, regex)?;
    let value = raw
        .trim_end_matches('/')
        .trim_end_matches(' ')
        .trim_end_matches('"');
    Some(decode(value))
}

fn decode(value: &str) -> String {
    html_escape::decode_html_entities(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<TITLE>Senate passes &amp; signs bill</TITLE>
<meta property="og:description" content="The bill &quot;passed&quot; late Tuesday." />
<meta property="og:image" content="https://cdn.example.com/lead.jpg"/>
</head><body>
<p>First paragraph.</p>
<p>Second &lt;para&gt;.</p>
<p class="byline">Skipped, has attributes.</p>
</body></html>"#;

    #[test]
    fn test_search_title_case_insensitive_and_decoded() {
        assert_eq!(
            search_title(PAGE).as_deref(),
            Some("Senate passes & signs bill")
        );
    }

    #[test]
    fn test_search_title_spans_lines() {
        let html = "<title>Line one\nline two</title>";
        assert_eq!(search_title(html).as_deref(), Some("Line one\nline two"));
    }

    #[test]
    fn test_search_description_trims_tag_tail() {
        assert_eq!(
            search_description(PAGE).as_deref(),
            Some("The bill \"passed\" late Tuesday.")
        );
    }

    #[test]
    fn test_search_image() {
        assert_eq!(
            search_image(PAGE).as_deref(),
            Some("https://cdn.example.com/lead.jpg")
        );
    }

    #[test]
    fn test_search_paragraphs_only_bare_tags() {
        assert_eq!(
            search_paragraphs(PAGE),
            vec!["First paragraph.".to_string(), "Second <para>.".to_string()]
        );
    }

    #[test]
    fn test_missing_values() {
        let html = "<html><body>nothing here</body></html>";
        assert_eq!(search_title(html), None);
        assert_eq!(search_description(html), None);
        assert_eq!(search_image(html), None);
        assert!(search_paragraphs(html).is_empty());
    }

    #[test]
    fn test_search_meta_combines_fields() {
        let meta = search_meta("https://example.com/a", PAGE);
        assert_eq!(meta.url, "https://example.com/a");
        assert!(meta.title.is_some());
        assert!(meta.description.is_some());
        assert!(meta.image_url.is_some());
    }
}
