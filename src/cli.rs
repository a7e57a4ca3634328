//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use expander_core::FetchMode;

/// Expand shortened URLs, classify domains and fetch page content.
///
/// Expander resolves redirect chains of short links (bit.ly, t.co, ...),
/// caches the destinations, and can download live or archived copies of
/// the pages they point to.
#[derive(Parser, Debug)]
#[command(name = "expander")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Read defaults from this config file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve URLs to their final destination, one output line per input URL
    Expand(ExpandArgs),
    /// Download page content and write one JSON record per URL
    Fetch(FetchArgs),
    /// Print the registrable domain of each URL
    Domain(DomainArgs),
    /// Extract shared links from tweet JSON lines, one JSON row per link
    Links(LinksArgs),
}

/// Arguments for `expander expand`.
#[derive(ClapArgs, Debug)]
pub struct ExpandArgs {
    /// URLs to expand (read from stdin when omitted)
    pub urls: Vec<String>,

    /// Concurrent workers (1-100)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: Option<u8>,

    /// URLs per worker-pool cycle (1-100000)
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..=100_000))]
    pub chunk_size: Option<usize>,

    /// JSON Lines cache file; already-cached URLs are not requested again
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Shuffle seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Request timeout in seconds (1-3600)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Use GET instead of HEAD requests
    #[arg(long)]
    pub get: bool,

    /// Only resolve URLs on known shortener domains; pass the rest through
    #[arg(long)]
    pub only_short: bool,

    /// Print `{original_url, resolved_url}` JSON lines instead of bare URLs
    #[arg(long)]
    pub json: bool,
}

/// Which fetch path(s) to take.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeArg {
    /// Live web only
    Live,
    /// Web archive only
    Archived,
    /// Live web, then the archive when the live fetch failed
    #[default]
    Auto,
}

impl From<ModeArg> for FetchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => Self::Live,
            ModeArg::Archived => Self::Archived,
            ModeArg::Auto => Self::LiveThenArchive,
        }
    }
}

/// Arguments for `expander links`.
#[derive(ClapArgs, Debug)]
pub struct LinksArgs {
    /// JSON Lines file of tweet objects (read from stdin when omitted)
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,
}

/// Arguments for `expander fetch`.
#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// URLs to fetch (read from stdin when omitted and no --input is given)
    pub urls: Vec<String>,

    /// JSON Lines file of request objects with a "url" key; other keys are copied to the output
    #[arg(short, long, value_name = "PATH", conflicts_with = "urls")]
    pub input: Option<PathBuf>,

    /// Fetch path
    #[arg(short, long, value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Write records to this JSON Lines file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite the output file instead of appending to it
    #[arg(long, requires = "output")]
    pub truncate: bool,

    /// Content request timeout in seconds (1-3600)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Minimum politeness delay before content and archive requests, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub delay_min: Option<u64>,

    /// Maximum politeness delay before content and archive requests, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub delay_max: Option<u64>,
}

/// Arguments for `expander domain`.
#[derive(ClapArgs, Debug)]
pub struct DomainArgs {
    /// URLs to classify (read from stdin when omitted)
    pub urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap_or_else(|error| panic!("parse failed: {error}"))
    }

    #[test]
    fn test_cli_expand_defaults() {
        let args = parse(&["expander", "expand"]);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        let Command::Expand(expand) = args.command else {
            panic!("expected expand subcommand");
        };
        assert!(expand.urls.is_empty());
        assert_eq!(expand.workers, None);
        assert_eq!(expand.chunk_size, None);
        assert!(!expand.get);
        assert!(!expand.only_short);
        assert!(!expand.json);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args = parse(&["expander", "domain", "-vv", "https://a.com"]);
        assert_eq!(args.verbose, 2);
        let Command::Domain(domain) = args.command else {
            panic!("expected domain subcommand");
        };
        assert_eq!(domain.urls, vec!["https://a.com".to_string()]);

        let args = parse(&["expander", "-q", "domain"]);
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_expand_options() {
        let args = parse(&[
            "expander",
            "expand",
            "-w",
            "16",
            "--chunk-size",
            "500",
            "--cache",
            "cache.jsonl",
            "--seed",
            "7",
            "--get",
            "--only-short",
            "https://bit.ly/x",
        ]);
        let Command::Expand(expand) = args.command else {
            panic!("expected expand subcommand");
        };
        assert_eq!(expand.workers, Some(16));
        assert_eq!(expand.chunk_size, Some(500));
        assert_eq!(expand.cache, Some(PathBuf::from("cache.jsonl")));
        assert_eq!(expand.seed, Some(7));
        assert!(expand.get);
        assert!(expand.only_short);
        assert_eq!(expand.urls, vec!["https://bit.ly/x".to_string()]);
    }

    #[test]
    fn test_cli_workers_out_of_range_rejected() {
        let result = Args::try_parse_from(["expander", "expand", "-w", "0"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["expander", "expand", "-w", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_fetch_mode_values() {
        let args = parse(&["expander", "fetch", "--mode", "archived", "https://a.com/x"]);
        let Command::Fetch(fetch) = args.command else {
            panic!("expected fetch subcommand");
        };
        assert_eq!(fetch.mode, ModeArg::Archived);
        assert_eq!(FetchMode::from(fetch.mode), FetchMode::Archived);
        assert_eq!(FetchMode::from(ModeArg::Auto), FetchMode::LiveThenArchive);
    }

    #[test]
    fn test_cli_fetch_truncate_requires_output() {
        let result = Args::try_parse_from(["expander", "fetch", "--truncate", "https://a.com"]);
        assert!(result.is_err());

        let args = parse(&["expander", "fetch", "--truncate", "-o", "out.jsonl", "https://a.com"]);
        let Command::Fetch(fetch) = args.command else {
            panic!("expected fetch subcommand");
        };
        assert!(fetch.truncate);
    }

    #[test]
    fn test_cli_fetch_input_conflicts_with_urls() {
        let result = Args::try_parse_from(["expander", "fetch", "-i", "in.jsonl", "https://a.com"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_links_input() {
        let args = parse(&["expander", "links", "--input", "tweets.jsonl"]);
        let Command::Links(links) = args.command else {
            panic!("expected links subcommand");
        };
        assert_eq!(links.input, Some(PathBuf::from("tweets.jsonl")));

        let args = parse(&["expander", "links"]);
        let Command::Links(links) = args.command else {
            panic!("expected links subcommand");
        };
        assert_eq!(links.input, None);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["expander"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["expander", "--help"]);
        let err = result.err().unwrap_or_else(|| panic!("--help should exit early"));
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
