//! User-Agent string for the tool's own HTTP traffic.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/expander";

/// Default User-Agent for resolution, content and archive requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("expander/{version} (link-research-tool; +{PROJECT_UA_URL})")
}
