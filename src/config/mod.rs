//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheBackend;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "raid-cache";
const ENV_PREFIX: &str = "RAID_CACHE";
const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_SCAN_BATCH_SIZE: u64 = 500;

/// Command-line arguments for the `raid-cache` operator tool.
#[derive(Debug, Parser)]
#[command(
    name = "raid-cache",
    version,
    about = "Inspect and invalidate the Albion Raid Manager cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "RAID_CACHE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the cache key for an entity or collection.
    Key(KeyArgs),
    /// Print the payload stored under a key.
    Get(GetArgs),
    /// Delete cached entries by pattern or by entity.
    Invalidate(InvalidateArgs),
    /// Validate an Albion item name such as `T6_2H_HOLYSTAFF@0`.
    Item(ItemArgs),
}

/// Entity and collection kinds known to the key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyKind {
    User,
    DiscordUser,
    UserServers,
    Server,
    ServerMembers,
    ServerMember,
    Raid,
    ServerRaids,
    RaidSlots,
    Build,
    ServerBuilds,
    Item,
    Items,
    Permissions,
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    #[arg(value_enum, value_name = "KIND")]
    pub kind: KeyKind,

    /// Entity identifier; for `items` it is an optional filter.
    #[arg(value_name = "ID")]
    pub id: Option<String>,

    /// Qualifier appended to the key (include-set, filter name, ...).
    #[arg(long, value_name = "QUALIFIER")]
    pub qualifier: Option<String>,

    /// Hash a JSON filter object and use the digest as qualifier.
    #[arg(long = "filter-json", value_name = "JSON", conflicts_with = "qualifier")]
    pub filter_json: Option<String>,

    /// Server id for `server-member` and `permissions` keys.
    #[arg(long, value_name = "SERVER_ID")]
    pub server: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct GetArgs {
    /// Exact cache key.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct InvalidateArgs {
    /// Glob pattern (Redis MATCH syntax); may be repeated.
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Invalidate everything derived from a user.
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<String>,

    /// Invalidate everything derived from a server.
    #[arg(long, value_name = "SERVER_ID")]
    pub server: Option<String>,

    /// Invalidate everything derived from a raid.
    #[arg(long, value_name = "RAID_ID")]
    pub raid: Option<String>,

    /// Invalidate everything derived from a build.
    #[arg(long, value_name = "BUILD_ID")]
    pub build: Option<String>,

    /// Invalidate all item entries.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub items: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ItemArgs {
    /// Item name to validate.
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the cache backend (memory|redis|disabled).
    #[arg(long = "cache-backend", value_name = "BACKEND", global = true)]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the in-memory store capacity.
    #[arg(long = "cache-memory-capacity", value_name = "COUNT", global = true)]
    pub cache_memory_capacity: Option<u64>,

    /// Override the default TTL; `0` disables expiry.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS", global = true)]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Toggle coalescing of concurrent misses.
    #[arg(
        long = "cache-single-flight",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_single_flight: Option<bool>,

    /// Override the SCAN batch size used for pattern deletes.
    #[arg(long = "cache-scan-batch-size", value_name = "COUNT", global = true)]
    pub cache_scan_batch_size: Option<u64>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub memory_capacity: NonZeroUsize,
    pub default_ttl_seconds: u64,
    pub single_flight: bool,
    pub scan_batch_size: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(capacity) = overrides.cache_memory_capacity {
            self.cache.memory_capacity = Some(capacity);
        }
        if let Some(ttl) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(ttl);
        }
        if let Some(single_flight) = overrides.cache_single_flight {
            self.cache.single_flight = Some(single_flight);
        }
        if let Some(batch) = overrides.cache_scan_batch_size {
            self.cache.scan_batch_size = Some(batch);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match cache.backend {
        Some(value) => CacheBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => CacheBackend::Memory,
    };

    let redis_url = cache.redis_url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    if backend == CacheBackend::Redis && redis_url.is_none() {
        return Err(LoadError::invalid(
            "cache.redis_url",
            "required when cache.backend is `redis`",
        ));
    }

    let memory_capacity = non_zero_usize(
        cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;
    let scan_batch_size = non_zero_usize(
        cache.scan_batch_size.unwrap_or(DEFAULT_SCAN_BATCH_SIZE),
        "cache.scan_batch_size",
    )?;

    Ok(CacheSettings {
        backend,
        redis_url,
        memory_capacity,
        default_ttl_seconds: cache.default_ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
        single_flight: cache.single_flight.unwrap_or(false),
        scan_batch_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    memory_capacity: Option<u64>,
    default_ttl_seconds: Option<u64>,
    single_flight: Option<bool>,
    scan_batch_size: Option<u64>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
