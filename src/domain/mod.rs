//! Registrable-domain classification for URLs.
//!
//! [`domain_of`] reduces a URL to its registrable domain (`www.nytimes.com/x`
//! becomes `nytimes.com`, `news.bbc.co.uk` becomes `bbc.co.uk`) using the
//! ICANN section of the public suffix list compiled into the binary. No
//! network access happens at any point.
//!
//! # Example
//!
//! ```
//! use expander_core::domain::{Domain, domain_of};
//!
//! assert_eq!(
//!     domain_of("https://www.nytimes.com/2016/06/01/world/x.html"),
//!     Domain::Name("nytimes.com".to_string())
//! );
//! assert_eq!(domain_of("not a url"), Domain::Unparsable);
//! ```

pub mod lists;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

pub use lists::{DomainLists, PostProcess};

/// Sentinel rendered for input that could not be parsed at all.
pub const UNPARSABLE_DOMAIN: &str = "ERROR";

/// Sentinel code for a failure nobody could interpret.
pub const UNKNOWN_DOMAIN_CODE: i64 = -1;

/// Classification of a URL by its registrable domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// A lowercased registrable domain, a raw host taken from an error
    /// message, or the lowercased URL itself when no registrable domain
    /// could be derived.
    Name(String),
    /// The input could not be parsed. Serialized as `"ERROR"`.
    Unparsable,
    /// A failure the error interpreter did not recognize. Serialized as `-1`.
    Unknown,
}

impl Domain {
    /// Returns the domain name, if this is a [`Domain::Name`].
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Unparsable | Self::Unknown => None,
        }
    }

    /// Returns true for the unknown-failure sentinel.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Unparsable => f.write_str(UNPARSABLE_DOMAIN),
            Self::Unknown => write!(f, "{UNKNOWN_DOMAIN_CODE}"),
        }
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Name(name) => serializer.serialize_str(name),
            Self::Unparsable => serializer.serialize_str(UNPARSABLE_DOMAIN),
            Self::Unknown => serializer.serialize_i64(UNKNOWN_DOMAIN_CODE),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDomain {
    Code(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawDomain::deserialize(deserializer)? {
            RawDomain::Code(UNKNOWN_DOMAIN_CODE) => Ok(Self::Unknown),
            RawDomain::Code(other) => Err(serde::de::Error::custom(format!(
                "unexpected domain code {other}, expected {UNKNOWN_DOMAIN_CODE}"
            ))),
            RawDomain::Text(text) if text == UNPARSABLE_DOMAIN => Ok(Self::Unparsable),
            RawDomain::Text(text) => Ok(Self::Name(text)),
        }
    }
}

/// Returns the registrable domain of `url`.
///
/// - Input without an extractable host yields [`Domain::Unparsable`].
/// - Hosts with no known public suffix (IP addresses, `localhost`, bare
///   suffixes) yield the whole input lowercased.
#[must_use]
pub fn domain_of(url: &str) -> Domain {
    let Some(host) = extract_host(url) else {
        debug!(url, "no host could be extracted");
        return Domain::Unparsable;
    };
    match registrable_domain(&host) {
        Some(domain) => Domain::Name(domain),
        None => Domain::Name(url.to_lowercase()),
    }
}

/// Returns true if the domain of `url` is a member of `domains`.
#[must_use]
pub fn is_short(url: &str, domains: &HashSet<String>) -> bool {
    domain_of(url)
        .as_name()
        .is_some_and(|domain| domains.contains(domain))
}

/// Pulls the host out of a URL leniently: the scheme is optional, and
/// userinfo, port, path, query and fragment are discarded.
fn extract_host(url: &str) -> Option<String> {
    let rest = strip_scheme(url.trim());
    let rest = rest.trim_start_matches(['/', '\\']);
    let authority = rest
        .split(['/', '?', '#', '\\'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();

    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() || !host.chars().all(is_host_char) {
        return None;
    }
    Some(host)
}

fn strip_scheme(url: &str) -> &str {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url;
    };
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    if valid { rest } else { url }
}

fn is_host_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':')
}

/// Public suffix plus one label, using ICANN suffixes only.
///
/// Private registry entries (`blogspot.com`, `github.io`) are not suffixes
/// here, so `nytimes.blogspot.com` reduces to `blogspot.com`.
fn registrable_domain(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').collect();
    (1..labels.len()).rev().find_map(|suffix_len| {
        let start = labels.len() - suffix_len;
        is_icann_suffix(&labels[start..].join(".")).then(|| labels[start - 1..].join("."))
    })
}

fn is_icann_suffix(candidate: &str) -> bool {
    psl::suffix(candidate.as_bytes()).is_some_and(|suffix| {
        matches!(suffix.typ(), Some(psl::Type::Icann)) && suffix.as_bytes() == candidate.as_bytes()
    })
}
