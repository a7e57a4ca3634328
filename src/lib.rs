//! Expander Core Library
//!
//! This library provides the core functionality for the expander tool,
//! which turns shortened, tracking and redirecting links into the URLs
//! they ultimately point at, classifies them by registrable domain and
//! optionally fetches the page content behind them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`domain`] - Registrable-domain classification and shortener lists
//! - [`normalize`] - URL standardization and generic-URL detection
//! - [`html`] - Title, description, paragraph and image scraping
//! - [`resolver`] - Single-URL resolution and failure interpretation
//! - [`dispatch`] - Deduplicated, cached, concurrent bulk expansion
//! - [`cache`] - Append-only JSON-lines record store
//! - [`fetch`] - Live and archived content fetching
//! - [`tweet`] - Link rows extracted from tweet JSON

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod dispatch;
pub mod domain;
pub mod fetch;
pub mod html;
pub mod normalize;
pub mod resolver;
pub mod tweet;
mod user_agent;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore};
pub use dispatch::{
    DEFAULT_CHUNK_SIZE, DEFAULT_SEED, DEFAULT_WORKERS, DispatchError, DroppedReason,
    ExpandOptions, ExpandReport, ExpandStats, Expander, UrlFilter,
};
pub use domain::{Domain, DomainLists, domain_of, is_short};
pub use fetch::{
    ArchiveClient, ArchiveError, ArticleExtractor, ContentRecord, FetchConfig, FetchError,
    FetchMode, FetchPath, FetchRequest, Fetcher, ParagraphExtractor, Snapshot, WaybackClient,
    WriteMode, load_fetched,
};
pub use normalize::{StandardizeOptions, is_generic_url, standardize_url};
pub use resolver::{
    BruteForceUnshortener, ContentResponse, FailureInterpretation, FailureKind, PolitenessDelay,
    RequestError, RequestOptions, Resolve, ResolveError, ResolutionResult, ResolverConfig,
    UnshortenError, Unshortener, UrlResolver, interpret_failure,
};
pub use tweet::{TweetLink, TweetType, links_of};
