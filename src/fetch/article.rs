//! Article main-text extraction.

use std::sync::LazyLock;

use regex::Regex;

use crate::html::search_paragraphs;
use crate::resolver::utils::compile_static_regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"<[^>]*>"));

/// Extracts the main text of an article from its HTML.
pub trait ArticleExtractor: Send + Sync {
    /// Returns the article text, or `None` when none could be found.
    fn extract(&self, html: &str, url: Option<&str>) -> Option<String>;
}

/// Joins the page's bare `<p>` paragraphs, with inline markup removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphExtractor;

impl ArticleExtractor for ParagraphExtractor {
    fn extract(&self, html: &str, _url: Option<&str>) -> Option<String> {
        let paragraphs: Vec<String> = search_paragraphs(html)
            .iter()
            .map(|paragraph| TAG_RE.replace_all(paragraph, "").trim().to_string())
            .filter(|paragraph| !paragraph.is_empty())
            .collect();
        (!paragraphs.is_empty()).then(|| paragraphs.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_extractor_strips_inline_tags() {
        let html = "<p>The <a href=\"/x\">senate</a> voted.</p><p>  </p><p><b>Then</b> it adjourned.</p>";
        assert_eq!(
            ParagraphExtractor.extract(html, None).as_deref(),
            Some("The senate voted.\n\nThen it adjourned.")
        );
    }

    #[test]
    fn test_paragraph_extractor_none_without_paragraphs() {
        assert_eq!(ParagraphExtractor.extract("<div>no paragraphs</div>", None), None);
    }
}
