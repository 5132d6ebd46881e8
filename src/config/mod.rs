//! Typed deployment settings resolved from files, environment and flags.

mod cli;

use std::{
    fs,
    net::SocketAddr,
    num::NonZeroU32,
    path::{Component, Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, DatabaseOverride, LoggingOverrides, ReloadArgs, ServeArgs, ServeOverrides,
    ServerOverrides, SiteOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vellum";
const ENV_PREFIX: &str = "VELLUM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_TEMPLATE_DIR: &str = "templates";
const DEFAULT_CACHE_DIR: &str = "render";

/// Validated settings; every field has a concrete value.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
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

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` runs without a backing store; store-driven prerender specs expand to nothing.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub template_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub reload_on_startup: bool,
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

/// Resolve settings from every source, lowest precedence first: the bundled
/// defaults file, a local `vellum.*` file, `--config-file`, `VELLUM__*`
/// environment variables, then command-line flags.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder();
    for basename in [DEFAULT_CONFIG_BASENAME, LOCAL_CONFIG_BASENAME] {
        builder = builder.add_source(File::with_name(basename).required(false));
    }
    if let Some(path) = cli.config_file.as_deref() {
        builder = builder.add_source(File::from(path).required(true));
    }
    let layered = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    let mut raw: RawSettings = layered.try_deserialize()?;
    match &cli.command {
        Some(Command::Reload(args)) => raw.apply_reload_overrides(args),
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration from the process arguments, returning both.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// Every key optional; unset keys fall back to defaults during validation.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
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
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    template_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    reload_on_startup: Option<bool>,
}

/// Replace `slot` when the override carries a value.
fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, flags: &ServeOverrides) {
        let server = &flags.server;
        overlay(&mut self.server.host, &server.host);
        overlay(&mut self.server.admin_host, &server.admin_host);
        overlay(&mut self.server.public_port, &server.public_port);
        overlay(&mut self.server.admin_port, &server.admin_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &server.graceful_shutdown_seconds,
        );
        overlay(&mut self.site.reload_on_startup, &flags.reload_on_startup);
        self.apply_shared(&flags.database, &flags.logging, &flags.site);
    }

    fn apply_reload_overrides(&mut self, args: &ReloadArgs) {
        self.apply_shared(&args.database, &args.logging, &args.site);
    }

    fn apply_shared(
        &mut self,
        database: &DatabaseOverride,
        logging: &LoggingOverrides,
        site: &SiteOverrides,
    ) {
        overlay(&mut self.database.url, &database.url);
        overlay(&mut self.database.max_connections, &database.max_connections);
        overlay(&mut self.logging.level, &logging.log_level);
        overlay(&mut self.logging.json, &logging.log_json);
        overlay(&mut self.site.template_dir, &site.template_dir);
        overlay(&mut self.site.cache_dir, &site.cache_dir);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: raw.server.try_into()?,
            logging: raw.logging.try_into()?,
            database: raw.database.try_into()?,
            site: raw.site.try_into()?,
        })
    }
}

impl TryFrom<RawServerSettings> for ServerSettings {
    type Error = LoadError;

    fn try_from(raw: RawServerSettings) -> Result<Self, LoadError> {
        let public_port = nonzero_port("server.public_port", raw.public_port, DEFAULT_PUBLIC_PORT)?;
        let admin_port = nonzero_port("server.admin_port", raw.admin_port, DEFAULT_ADMIN_PORT)?;

        let public_host = raw.host.as_deref().unwrap_or(DEFAULT_HOST);
        let admin_host = raw.admin_host.as_deref().unwrap_or(DEFAULT_ADMIN_HOST);
        let public_addr = socket_addr("server.host", public_host, public_port)?;
        let admin_addr = socket_addr("server.admin_host", admin_host, admin_port)?;
        if public_addr == admin_addr {
            return Err(LoadError::invalid(
                "server.admin_port",
                format!("admin listener would share the public address {public_addr}"),
            ));
        }

        let grace = raw
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
        if grace == 0 {
            return Err(LoadError::invalid(
                "server.graceful_shutdown_seconds",
                "must be at least one second",
            ));
        }

        Ok(Self {
            public_addr,
            admin_addr,
            graceful_shutdown: Duration::from_secs(grace),
        })
    }
}

impl TryFrom<RawLoggingSettings> for LoggingSettings {
    type Error = LoadError;

    fn try_from(raw: RawLoggingSettings) -> Result<Self, LoadError> {
        let level = raw
            .level
            .as_deref()
            .map(LevelFilter::from_str)
            .transpose()
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?
            .unwrap_or(LevelFilter::INFO);

        let format = match raw.json {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self { level, format })
    }
}

impl TryFrom<RawDatabaseSettings> for DatabaseSettings {
    type Error = LoadError;

    fn try_from(raw: RawDatabaseSettings) -> Result<Self, LoadError> {
        // A blank URL (e.g. an empty env var) means "no database".
        let url = raw
            .url
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());

        let max_connections =
            NonZeroU32::new(raw.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS))
                .ok_or_else(|| {
                    LoadError::invalid("database.max_connections", "must be at least one")
                })?;

        Ok(Self {
            url,
            max_connections,
        })
    }
}

impl TryFrom<RawSiteSettings> for SiteSettings {
    type Error = LoadError;

    fn try_from(raw: RawSiteSettings) -> Result<Self, LoadError> {
        let template_dir = non_empty_dir("site.template_dir", raw.template_dir, DEFAULT_TEMPLATE_DIR)?;
        let cache_dir = non_empty_dir("site.cache_dir", raw.cache_dir, DEFAULT_CACHE_DIR)?;
        // Reload deletes sentinel files from the cache directory, so it must not
        // double as the template source.
        if same_dir(&cache_dir, &template_dir) {
            return Err(LoadError::invalid(
                "site.cache_dir",
                "must differ from site.template_dir",
            ));
        }

        Ok(Self {
            template_dir,
            cache_dir,
            reload_on_startup: raw.reload_on_startup.unwrap_or(true),
        })
    }
}

fn nonzero_port(key: &'static str, value: Option<u16>, default: u16) -> Result<u16, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "port must be greater than zero")),
        port => Ok(port),
    }
}

fn socket_addr(key: &'static str, host: &str, port: u16) -> Result<SocketAddr, LoadError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|err| LoadError::invalid(key, format!("`{host}:{port}` is not an address: {err}")))
}

/// Resolved paths when both directories exist, otherwise a lexical
/// comparison that ignores `.` components.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => without_cur_dir(a) == without_cur_dir(b),
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn non_empty_dir(
    key: &'static str,
    value: Option<PathBuf>,
    default: &str,
) -> Result<PathBuf, LoadError> {
    let dir = value.unwrap_or_else(|| PathBuf::from(default));
    if dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(dir)
}
