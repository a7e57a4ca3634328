//! CLI entry point for the expander tool.

use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use expander_core::dispatch::DEFAULT_WORKERS;
use expander_core::fetch::requests_from_values;
use expander_core::resolver::{DEFAULT_CONTENT_TIMEOUT, DEFAULT_TIMEOUT};
use expander_core::{
    DEFAULT_CHUNK_SIZE, DEFAULT_SEED, ExpandOptions, Expander, FetchConfig, FetchMode,
    FetchRequest, Fetcher, PolitenessDelay, RequestOptions, Resolve, ResolverConfig, UrlResolver,
    WaybackClient, WriteMode, domain_of, links_of,
};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::FileConfig;
use cli::{Args, Command, DomainArgs, ExpandArgs, FetchArgs, LinksArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = app_config::load_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => loaded
                .config
                .verbosity
                .map_or("info", app_config::VerbositySetting::as_filter),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, config = ?loaded.config, "loaded config file");
    }

    match args.command {
        Command::Expand(expand) => run_expand(expand, &loaded.config, args.quiet).await,
        Command::Fetch(fetch) => run_fetch(fetch, &loaded.config).await,
        Command::Domain(domain) => run_domain(&domain),
        Command::Links(links) => run_links(&links).await,
    }
}

/// Returns URLs from positional args, or from stdin when it is piped.
fn read_urls(urls: Vec<String>) -> Result<Option<Vec<String>>> {
    if !urls.is_empty() {
        return Ok(Some(urls));
    }
    if io::stdin().is_terminal() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://bit.ly/2yUVQDz' | expander expand");
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read URLs from stdin")?;
    Ok(Some(parse_url_lines(&buffer)))
}

fn parse_url_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn connect_timeout(config: &FileConfig, resolver: ResolverConfig) -> ResolverConfig {
    match config.connect_timeout_secs {
        Some(secs) => resolver.with_connect_timeout(Duration::from_secs(secs)),
        None => resolver,
    }
}

async fn run_expand(args: ExpandArgs, config: &FileConfig, quiet: bool) -> Result<()> {
    let Some(urls) = read_urls(args.urls)? else {
        return Ok(());
    };
    if urls.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let timeout = args
        .timeout
        .or(config.timeout_secs)
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
    let use_get = args.get || config.use_get.unwrap_or(false);
    let request = RequestOptions::default()
        .with_timeout(timeout)
        .with_head(!use_get);
    let resolver_config = connect_timeout(config, ResolverConfig::default().with_request(request));
    let resolver =
        Arc::new(UrlResolver::new(resolver_config).context("Failed to build HTTP client")?);

    let cache_path = args.cache.or_else(|| config.cache_path.clone());
    let mut options = ExpandOptions::default()
        .with_worker_count(
            args.workers
                .map(usize::from)
                .or(config.workers)
                .unwrap_or(DEFAULT_WORKERS),
        )
        .with_chunk_size(args.chunk_size.or(config.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE))
        .with_seed(args.seed.or(config.seed).unwrap_or(DEFAULT_SEED));
    if let Some(path) = &cache_path {
        options = options.with_cache_path(path);
    }
    let only_short = args.only_short || config.only_short.unwrap_or(false);
    if only_short {
        options = options.only_short_links(resolver.lists());
    }
    debug!(?options, ?timeout, use_get, "expand options");

    let expander = Expander::new(Arc::clone(&resolver) as Arc<dyn Resolve>, options)?;

    let resolved = if urls.len() == 1 && cache_path.is_none() && !only_short {
        vec![expander.expand_one(&urls[0]).await]
    } else {
        let use_spinner = !quiet && io::stderr().is_terminal();
        let (handle, stop) =
            progress::spawn_progress_ui(use_spinner, expander.progress(), urls.len());
        let report = expander.expand_with_report(&urls).await;
        progress::stop_progress_ui(handle, &stop).await;
        let report = report.context("URL expansion failed")?;

        info!(
            unique = report.stats.unique,
            filtered_out = report.stats.filtered_out,
            cached = report.stats.cached,
            resolved = report.stats.resolved,
            dropped = report.stats.dropped,
            "Expansion complete"
        );
        report.urls
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (original, expanded) in urls.iter().zip(&resolved) {
        if args.json {
            let line = json!({"original_url": original, "resolved_url": expanded});
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{expanded}")?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Merges CLI and config delay bounds; a lone bound keeps the other default when consistent.
fn politeness_delay(min: Option<u64>, max: Option<u64>) -> PolitenessDelay {
    let default = PolitenessDelay::default();
    match (min, max) {
        (None, None) => default,
        (Some(min), None) => PolitenessDelay::new(min, default.max_secs.max(min)),
        (None, Some(max)) => PolitenessDelay::new(default.min_secs.min(max), max),
        (Some(min), Some(max)) => PolitenessDelay::new(min, max),
    }
}

/// Parses JSON Lines, skipping blank and malformed lines.
fn parse_json_lines(raw: &str, what: &str) -> Vec<Value> {
    let mut values = Vec::new();
    for (line_index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(error) => {
                warn!(line = line_index + 1, error = %error, "skipping malformed {what} line");
            }
        }
    }
    values
}

async fn read_requests(path: &Path) -> Result<Vec<FetchRequest>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request file '{}'", path.display()))?;
    Ok(requests_from_values(parse_json_lines(&raw, "request")))
}

async fn run_fetch(args: FetchArgs, config: &FileConfig) -> Result<()> {
    let requests = if let Some(path) = &args.input {
        read_requests(path).await?
    } else {
        let Some(urls) = read_urls(args.urls)? else {
            return Ok(());
        };
        urls.into_iter().map(FetchRequest::new).collect()
    };
    if requests.is_empty() {
        info!("No fetch requests found in input");
        return Ok(());
    }

    let timeout = args
        .timeout
        .or(config.content_timeout_secs)
        .map_or(DEFAULT_CONTENT_TIMEOUT, Duration::from_secs);
    let delay = politeness_delay(
        args.delay_min.or(config.delay_min_secs),
        args.delay_max.or(config.delay_max_secs),
    );
    let mode = FetchMode::from(args.mode);
    debug!(?timeout, ?delay, ?mode, requests = requests.len(), "fetch options");

    let resolver_config = connect_timeout(
        config,
        ResolverConfig::default()
            .with_content_timeout(timeout)
            .with_content_delay(delay),
    );
    let resolver = UrlResolver::new(resolver_config).context("Failed to build HTTP client")?;
    let archive = WaybackClient::new()
        .context("Failed to build archive HTTP client")?
        .with_timeout(timeout);
    let fetch_config = FetchConfig::default()
        .with_timeout(timeout)
        .with_archive_delay(delay);
    let fetcher = Fetcher::new(resolver, Arc::new(archive), fetch_config);

    if let Some(path) = &args.output {
        let write_mode = if args.truncate {
            WriteMode::Truncate
        } else {
            WriteMode::Append
        };
        let written = fetcher
            .fetch_many_to_file(requests, mode, path, write_mode)
            .await
            .with_context(|| format!("Failed to write records to '{}'", path.display()))?;
        info!(written, path = %path.display(), "Fetch complete");
        return Ok(());
    }

    let records = fetcher.fetch_many(requests, mode);
    futures_util::pin_mut!(records);
    let stdout = io::stdout();
    while let Some(record) = records.next().await {
        let line = serde_json::to_string(&record).context("Failed to serialize record")?;
        let mut out = stdout.lock();
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    Ok(())
}

fn run_domain(args: &DomainArgs) -> Result<()> {
    let Some(urls) = read_urls(args.urls.clone())? else {
        return Ok(());
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for url in &urls {
        writeln!(out, "{url}\t{}", domain_of(url))?;
    }
    out.flush()?;
    Ok(())
}

async fn run_links(args: &LinksArgs) -> Result<()> {
    let raw = if let Some(path) = &args.input {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read tweet file '{}'", path.display()))?
    } else if io::stdin().is_terminal() {
        info!("No input provided. Pipe tweet JSON lines via stdin or pass --input.");
        return Ok(());
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read tweets from stdin")?;
        buffer
    };

    let tweets = parse_json_lines(&raw, "tweet");
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut rows = 0_usize;
    for tweet in &tweets {
        for link in links_of(tweet) {
            let line = serde_json::to_string(&link).context("Failed to serialize link row")?;
            writeln!(out, "{line}")?;
            rows += 1;
        }
    }
    out.flush()?;
    info!(tweets = tweets.len(), rows, "Link extraction complete");
    Ok(())
}
