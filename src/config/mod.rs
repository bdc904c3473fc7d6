//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides, StoreOverrides, WarmArgs};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tutorium";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_CACHE_RECONNECT_BASE_MS: u64 = 500;
const DEFAULT_CACHE_RECONNECT_MAX_MS: u64 = 10_000;
const DEFAULT_CACHE_RECONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_CACHE_POST_TTL_SECS: u64 = 3_600;
const DEFAULT_CACHE_NEGATIVE_TTL_SECS: u64 = 300;
const DEFAULT_LISTING_CAPACITY: u64 = 100;
const DEFAULT_LISTING_TTL_SECS: u64 = 300;
const DEFAULT_LISTING_EVICT_PERCENT: u64 = 30;
const DEFAULT_LISTING_FETCH_TIMEOUT_MS: u64 = 8_000;

const DEFAULT_WARM_TARGETS: &[(&str, &str)] = &[
    ("HTML", "html-basics"),
    ("CSS", "css-basics"),
    ("JavaScript", "javascript-basics"),
    ("Python", "python-basics"),
    ("React", "react-basics"),
];

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub listing: ListingSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Production,
    Development,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub environment: AppEnvironment,
}

impl AppSettings {
    pub fn is_development(&self) -> bool {
        self.environment == AppEnvironment::Development
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
    Disabled,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            "disabled" | "none" | "off" => Ok(CacheBackend::Disabled),
            other => Err(format!("unknown cache backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WarmTargetSetting {
    pub language: String,
    pub heading: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub url: String,
    pub op_timeout_ms: NonZeroU64,
    pub reconnect_base_ms: NonZeroU64,
    pub reconnect_max_ms: NonZeroU64,
    pub max_reconnect_attempts: NonZeroU32,
    pub post_ttl_secs: NonZeroU64,
    pub negative_ttl_secs: NonZeroU64,
    pub warm_targets: Vec<WarmTargetSetting>,
    pub warm_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub capacity: NonZeroUsize,
    pub ttl_secs: NonZeroU64,
    /// Percentage of entries evicted together, 1..=100.
    pub evict_percent: usize,
    pub fetch_timeout_ms: NonZeroU64,
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

    builder = builder.add_source(Environment::with_prefix("TUTORIUM").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Warm(args)) => raw.apply_store_overrides(&args.store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

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
    server: RawServerSettings,
    logging: RawLoggingSettings,
    app: RawAppSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    listing: RawListingSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(environment) = overrides.environment.as_ref() {
            self.app.environment = Some(environment.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(warm) = overrides.cache_warm_on_startup {
            self.cache.warm_on_startup = Some(warm);
        }
        if let Some(capacity) = overrides.listing_capacity {
            self.listing.capacity = Some(capacity);
        }

        self.apply_store_overrides(&overrides.store);
    }

    fn apply_store_overrides(&mut self, overrides: &StoreOverrides) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_url.as_ref() {
            self.cache.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            app,
            database,
            cache,
            listing,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            app: build_app_settings(app)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            listing: build_listing_settings(listing)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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

fn build_app_settings(app: RawAppSettings) -> Result<AppSettings, LoadError> {
    let environment = match app.environment.as_deref().map(str::trim) {
        None | Some("") => AppEnvironment::Production,
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => AppEnvironment::Production,
            "development" | "dev" => AppEnvironment::Development,
            other => {
                return Err(LoadError::invalid(
                    "app.environment",
                    format!("expected `production` or `development`, got `{other}`"),
                ));
            }
        },
    };

    Ok(AppSettings { environment })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        max_connections: non_zero_u32(max_connections.into(), "database.max_connections")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend = match non_blank(cache.backend) {
        Some(value) => value
            .parse::<CacheBackend>()
            .map_err(|reason| LoadError::invalid("cache.backend", reason))?,
        None => CacheBackend::Redis,
    };
    let url = non_blank(cache.url).unwrap_or_else(|| DEFAULT_CACHE_URL.to_string());

    let reconnect_base_ms = non_zero_u64(
        cache
            .reconnect_base_ms
            .unwrap_or(DEFAULT_CACHE_RECONNECT_BASE_MS),
        "cache.reconnect_base_ms",
    )?;
    let reconnect_max_ms = non_zero_u64(
        cache
            .reconnect_max_ms
            .unwrap_or(DEFAULT_CACHE_RECONNECT_MAX_MS),
        "cache.reconnect_max_ms",
    )?;
    if reconnect_max_ms < reconnect_base_ms {
        return Err(LoadError::invalid(
            "cache.reconnect_max_ms",
            "must not be smaller than cache.reconnect_base_ms",
        ));
    }

    let warm_targets = match cache.warm_targets {
        Some(targets) => targets,
        None => DEFAULT_WARM_TARGETS
            .iter()
            .map(|(language, heading)| WarmTargetSetting {
                language: language.to_string(),
                heading: heading.to_string(),
            })
            .collect(),
    };
    if let Some(blank) = warm_targets
        .iter()
        .find(|target| target.language.trim().is_empty() || target.heading.trim().is_empty())
    {
        return Err(LoadError::invalid(
            "cache.warm_targets",
            format!("language and heading are required, got {blank:?}"),
        ));
    }

    Ok(CacheSettings {
        backend,
        url,
        op_timeout_ms: non_zero_u64(
            cache.op_timeout_ms.unwrap_or(DEFAULT_CACHE_OP_TIMEOUT_MS),
            "cache.op_timeout_ms",
        )?,
        reconnect_base_ms,
        reconnect_max_ms,
        max_reconnect_attempts: non_zero_u32(
            cache
                .max_reconnect_attempts
                .unwrap_or(DEFAULT_CACHE_RECONNECT_ATTEMPTS)
                .into(),
            "cache.max_reconnect_attempts",
        )?,
        post_ttl_secs: non_zero_u64(
            cache.post_ttl_secs.unwrap_or(DEFAULT_CACHE_POST_TTL_SECS),
            "cache.post_ttl_secs",
        )?,
        negative_ttl_secs: non_zero_u64(
            cache
                .negative_ttl_secs
                .unwrap_or(DEFAULT_CACHE_NEGATIVE_TTL_SECS),
            "cache.negative_ttl_secs",
        )?,
        warm_targets,
        warm_on_startup: cache.warm_on_startup.unwrap_or(false),
    })
}

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let capacity = listing.capacity.unwrap_or(DEFAULT_LISTING_CAPACITY);
    let capacity = usize::try_from(capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| LoadError::invalid("listing.capacity", "must be between 1 and usize::MAX"))?;

    let evict_percent = listing
        .evict_percent
        .unwrap_or(DEFAULT_LISTING_EVICT_PERCENT);
    if !(1..=100).contains(&evict_percent) {
        return Err(LoadError::invalid(
            "listing.evict_percent",
            "must be between 1 and 100",
        ));
    }

    Ok(ListingSettings {
        capacity,
        ttl_secs: non_zero_u64(
            listing.ttl_secs.unwrap_or(DEFAULT_LISTING_TTL_SECS),
            "listing.ttl_secs",
        )?,
        evict_percent: evict_percent as usize,
        fetch_timeout_ms: non_zero_u64(
            listing
                .fetch_timeout_ms
                .unwrap_or(DEFAULT_LISTING_FETCH_TIMEOUT_MS),
            "listing.fetch_timeout_ms",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAppSettings {
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    url: Option<String>,
    op_timeout_ms: Option<u64>,
    reconnect_base_ms: Option<u64>,
    reconnect_max_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    post_ttl_secs: Option<u64>,
    negative_ttl_secs: Option<u64>,
    warm_targets: Option<Vec<WarmTargetSetting>>,
    warm_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawListingSettings {
    capacity: Option<u64>,
    ttl_secs: Option<u64>,
    evict_percent: Option<u64>,
    fetch_timeout_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
