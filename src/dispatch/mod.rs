//! Bulk URL expansion.
//!
//! [`Expander`] resolves a list of URLs and returns the destinations in the
//! caller's order, duplicates included. Each unique URL is resolved at most
//! once per run, and URLs already present in the cache file are not
//! resolved at all.
//!
//! # Overview
//!
//! 1. Deduplicate (first occurrence wins) and shuffle with a fixed seed so
//!    consecutive requests rarely hit the same host.
//! 2. Apply the optional filter, then drop URLs already cached.
//! 3. Resolve the rest in fixed-size chunks on a bounded worker pool,
//!    appending each result to the cache as soon as it arrives.
//! 4. Map every input URL to its resolved URL, falling back to the input.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use expander_core::dispatch::{ExpandOptions, Expander};
//! use expander_core::resolver::{ResolverConfig, UrlResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Arc::new(UrlResolver::new(ResolverConfig::default())?);
//! let options = ExpandOptions::default()
//!     .with_worker_count(8)
//!     .with_cache_path("expanded.jsonl");
//! let expander = Expander::new(resolver, options)?;
//! let urls = vec!["https://bit.ly/2yUVQDz".to_string(), "https://t.co/abc".to_string()];
//! let resolved = expander.expand(&urls).await?;
//! assert_eq!(resolved.len(), urls.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod pool;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::cache::CacheStore;
use crate::domain::{DomainLists, is_short};
use crate::resolver::{Resolve, ResolutionResult};

pub use error::{DispatchError, DroppedReason};
use pool::WorkerPool;

/// Default number of URLs per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1280;

/// Default number of workers.
pub const DEFAULT_WORKERS: usize = 1;

/// Default shuffle seed.
pub const DEFAULT_SEED: u64 = 303;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Minimum allowed chunk size.
pub const MIN_CHUNK_SIZE: usize = 1;

/// Maximum allowed chunk size.
pub const MAX_CHUNK_SIZE: usize = 100_000;

/// Predicate selecting which URLs get resolved; rejected URLs pass through unchanged.
pub type UrlFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Options for a bulk expansion run.
#[derive(Clone)]
pub struct ExpandOptions {
    /// URLs per pool cycle.
    pub chunk_size: usize,
    /// Concurrent workers per chunk.
    pub worker_count: usize,
    /// JSON Lines cache of [`ResolutionResult`]s, if any.
    pub cache_path: Option<PathBuf>,
    /// Shuffle seed.
    pub seed: u64,
    /// Optional URL filter.
    pub filter: Option<UrlFilter>,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_count: DEFAULT_WORKERS,
            cache_path: None,
            seed: DEFAULT_SEED,
            filter: None,
        }
    }
}

impl std::fmt::Debug for ExpandOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpandOptions")
            .field("chunk_size", &self.chunk_size)
            .field("worker_count", &self.worker_count)
            .field("cache_path", &self.cache_path)
            .field("seed", &self.seed)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ExpandOptions {
    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Enables the cache at `path`.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Sets the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the URL filter.
    #[must_use]
    pub fn with_filter(mut self, filter: UrlFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Restricts resolution to URLs on known shortener, ad-redirect and appender domains.
    #[must_use]
    pub fn only_short_links(self, lists: &DomainLists) -> Self {
        let domains = lists.all_short_domains();
        self.with_filter(Arc::new(move |url: &str| is_short(url, &domains)))
    }

    fn validate(&self) -> Result<(), DispatchError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.worker_count) {
            return Err(DispatchError::InvalidWorkerCount {
                value: self.worker_count,
            });
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(DispatchError::InvalidChunkSize {
                value: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// Counters for one expansion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpandStats {
    /// Distinct input URLs.
    pub unique: usize,
    /// URLs rejected by the filter.
    pub filtered_out: usize,
    /// URLs skipped because the cache already had them.
    pub cached: usize,
    /// URLs resolved in this run.
    pub resolved: usize,
    /// URLs whose resolution was dropped.
    pub dropped: usize,
}

/// Resolved URLs in input order, plus run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandReport {
    /// One entry per input URL.
    pub urls: Vec<String>,
    /// Run statistics.
    pub stats: ExpandStats,
}

/// Concurrent, cached bulk expander.
pub struct Expander {
    resolver: Arc<dyn Resolve>,
    options: ExpandOptions,
    progress: Arc<AtomicUsize>,
    span: Span,
}

impl Expander {
    /// Creates an expander.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the worker count or chunk size is out of range.
    pub fn new(resolver: Arc<dyn Resolve>, options: ExpandOptions) -> Result<Self, DispatchError> {
        options.validate()?;
        Ok(Self {
            resolver,
            options,
            progress: Arc::new(AtomicUsize::new(0)),
            span: info_span!("dispatcher"),
        })
    }

    /// Options in use.
    #[must_use]
    pub fn options(&self) -> &ExpandOptions {
        &self.options
    }

    /// Counter of work items finished in the current run, for progress display.
    #[must_use]
    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.progress)
    }

    /// Resolves one URL directly, bypassing the pool and the cache.
    ///
    /// Returns the input unchanged if nothing could be resolved.
    pub async fn expand_one(&self, url: &str) -> String {
        match self.resolver.resolve(url).instrument(self.span.clone()).await {
            Ok(result) => result.resolved_url.unwrap_or_else(|| url.to_string()),
            Err(error) => {
                warn!(parent: &self.span, url, error = %error, "single URL resolution failed");
                url.to_string()
            }
        }
    }

    /// Resolves `urls`, returning one URL per input in input order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Cache`] when an existing cache file cannot be read.
    pub async fn expand(&self, urls: &[String]) -> Result<Vec<String>, DispatchError> {
        Ok(self.expand_with_report(urls).await?.urls)
    }

    /// [`Self::expand`] plus run statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Cache`] when an existing cache file cannot be read.
    pub async fn expand_with_report(&self, urls: &[String]) -> Result<ExpandReport, DispatchError> {
        self.run(urls).instrument(self.span.clone()).await
    }

    async fn run(&self, urls: &[String]) -> Result<ExpandReport, DispatchError> {
        self.progress.store(0, Ordering::Relaxed);
        let mut stats = ExpandStats::default();

        let mut pending = dedupe(urls);
        stats.unique = pending.len();
        pending.shuffle(&mut StdRng::seed_from_u64(self.options.seed));

        if let Some(filter) = &self.options.filter {
            let before = pending.len();
            pending.retain(|url| filter(url.as_str()));
            stats.filtered_out = before - pending.len();
        }

        let cache = self
            .options
            .cache_path
            .as_ref()
            .map(|path| CacheStore::<ResolutionResult>::new(path.clone()));

        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        if let Some(store) = &cache {
            for record in store.load().await? {
                resolved.insert(record.original_url, record.resolved_url);
            }
            let before = pending.len();
            pending.retain(|url| !resolved.contains_key(url));
            stats.cached = before - pending.len();
        }

        info!(
            unique = stats.unique,
            filtered_out = stats.filtered_out,
            cached = stats.cached,
            pending = pending.len(),
            "starting expansion"
        );

        for (chunk_index, chunk) in pending.chunks(self.options.chunk_size).enumerate() {
            debug!(chunk_index, size = chunk.len(), "dispatching chunk");
            let mut pool = WorkerPool::spawn(
                chunk.to_vec(),
                self.options.worker_count,
                Arc::clone(&self.resolver),
                &self.span,
            );

            while let Some(outcome) = pool.next_outcome().await {
                match outcome.result {
                    Ok(record) => {
                        if let Some(store) = &cache
                            && let Err(error) = store.append(&record).await
                        {
                            warn!(
                                url = %record.original_url,
                                error = %error,
                                "failed to append cache record"
                            );
                        }
                        resolved.insert(record.original_url, record.resolved_url);
                        stats.resolved += 1;
                    }
                    Err(reason) => {
                        warn!(url = %outcome.url, reason = %reason, "dropping URL");
                        stats.dropped += 1;
                    }
                }
                self.progress.fetch_add(1, Ordering::Relaxed);
            }
            pool.join().await;
        }

        info!(
            resolved = stats.resolved,
            dropped = stats.dropped,
            "expansion complete"
        );

        let urls = urls
            .iter()
            .map(|url| {
                resolved
                    .get(url)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| url.clone())
            })
            .collect();
        Ok(ExpandReport { urls, stats })
    }
}

fn dedupe(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.iter()
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}
