//! Configuration file loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines (a TOML subset). Values
//! from the file apply only where the command line did not set one.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

/// File configuration for expander defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default worker count for `expand` (1..=100).
    pub workers: Option<usize>,
    /// Default chunk size for `expand` (1..=100000).
    pub chunk_size: Option<usize>,
    /// Default cache file for `expand`.
    pub cache_path: Option<PathBuf>,
    /// Default shuffle seed.
    pub seed: Option<u64>,
    /// Resolution request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Resolve with GET instead of HEAD.
    pub use_get: Option<bool>,
    /// Only resolve known short links.
    pub only_short: Option<bool>,
    /// Content request timeout in seconds.
    pub content_timeout_secs: Option<u64>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Lower bound of the politeness delay in seconds.
    pub delay_min_secs: Option<u64>,
    /// Upper bound of the politeness delay in seconds.
    pub delay_max_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against the CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=100).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..=100");
        }

        if let Some(chunk_size) = self.chunk_size
            && !(1..=100_000).contains(&chunk_size)
        {
            bail!(
                "Invalid config value for `chunk_size`: {chunk_size}. Expected range: 1..=100000"
            );
        }

        validate_timeout_secs("timeout_secs", self.timeout_secs)?;
        validate_timeout_secs("content_timeout_secs", self.content_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_delay_secs("delay_min_secs", self.delay_min_secs)?;
        validate_delay_secs("delay_max_secs", self.delay_max_secs)?;

        if let (Some(min), Some(max)) = (self.delay_min_secs, self.delay_max_secs)
            && min > max
        {
            bail!(
                "Invalid config: `delay_min_secs` ({min}) is greater than `delay_max_secs` ({max})"
            );
        }

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_delay_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 3600 {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    fn from_label(label: &str) -> Result<Self> {
        match label {
            "default" => Ok(Self::Default),
            "verbose" => Ok(Self::Verbose),
            "quiet" => Ok(Self::Quiet),
            "debug" => Ok(Self::Debug),
            _ => bail!("Expected one of: default, verbose, quiet, debug; got '{label}'"),
        }
    }

    /// Tracing filter directive for this setting.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if one is known.
    pub path: Option<PathBuf>,
    /// Parsed file config, or the empty config when no file exists.
    pub config: FileConfig,
    /// Whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/expander/config.toml`
/// 2. `$HOME/.config/expander/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("expander").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("expander")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` when given, otherwise from the default path if present.
///
/// An explicit path must exist; a missing default file yields the empty config.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (index, raw_line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .map(|(key, value)| (key.trim(), value.trim()))
            .ok_or_else(|| {
                anyhow!("Invalid config syntax on line {line_no}: expected key = value")
            })?;

        cfg.apply(key, value)
            .with_context(|| format!("Invalid `{key}` value on line {line_no}"))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

impl FileConfig {
    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "workers" => self.workers = Some(parse_unsigned(value)?),
            "chunk_size" => self.chunk_size = Some(parse_unsigned(value)?),
            "cache_path" => self.cache_path = Some(PathBuf::from(parse_quoted(value)?)),
            "seed" => self.seed = Some(parse_unsigned(value)?),
            "timeout_secs" => self.timeout_secs = Some(parse_unsigned(value)?),
            "use_get" => self.use_get = Some(parse_flag(value)?),
            "only_short" => self.only_short = Some(parse_flag(value)?),
            "content_timeout_secs" => self.content_timeout_secs = Some(parse_unsigned(value)?),
            "connect_timeout_secs" => self.connect_timeout_secs = Some(parse_unsigned(value)?),
            "delay_min_secs" => self.delay_min_secs = Some(parse_unsigned(value)?),
            "delay_max_secs" => self.delay_max_secs = Some(parse_unsigned(value)?),
            "verbosity" => {
                let label = parse_quoted(value)?;
                self.verbosity = Some(VerbositySetting::from_label(&label)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}'"),
        }
        Ok(())
    }
}

/// Drops a trailing `# comment`, ignoring `#` inside double quotes.
fn strip_inline_comment(line: &str) -> &str {
    let mut quoted = false;
    line.char_indices()
        .find_map(|(index, ch)| {
            if ch == '"' {
                quoted = !quoted;
            }
            (ch == '#' && !quoted).then_some(index)
        })
        .map_or(line, |index| &line[..index])
}

fn parse_quoted(raw_value: &str) -> Result<String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Expected double-quoted string"))
}

fn parse_unsigned<T: TryFrom<u64>>(raw_value: &str) -> Result<T> {
    let token = raw_value.trim();
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    let value: u64 = token
        .parse()
        .with_context(|| format!("Expected integer value, got '{token}'"))?;
    T::try_from(value).map_err(|_| anyhow!("Integer value {value} out of range"))
}

fn parse_flag(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("Expected 'true' or 'false', got '{other}'"),
    }
}
