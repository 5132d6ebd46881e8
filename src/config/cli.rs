use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Render a content site from templates, serving pages from a disk cache.
#[derive(Debug, Parser)]
#[command(name = "vellum", version)]
pub struct CliArgs {
    /// Extra configuration file layered over `config/default` and `vellum.*`.
    #[arg(
        long = "config-file",
        env = "VELLUM_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve pages on the public listener and reload on the admin listener (default).
    Serve(Box<ServeArgs>),
    /// Run one reload cycle (clear, compile, prerender) and exit.
    Reload(ReloadArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ReloadArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
    #[command(flatten)]
    pub site: SiteOverrides,
    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub server: ServerOverrides,
    #[command(flatten)]
    pub database: DatabaseOverride,
    #[command(flatten)]
    pub site: SiteOverrides,
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Reload before accepting traffic.
    #[arg(
        long = "site-reload-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub reload_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServerOverrides {
    /// Host the public listener binds to.
    #[arg(long = "server-host", value_name = "HOST")]
    pub host: Option<String>,

    /// Host the admin listener binds to.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub admin_host: Option<String>,

    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Seconds open connections get to finish after a shutdown signal.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DatabaseOverride {
    /// PostgreSQL URL of the post store; blank disables it.
    #[arg(long = "database-url", value_name = "URL")]
    pub url: Option<String>,

    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SiteOverrides {
    /// Directory whose files are compiled as templates.
    #[arg(long = "site-template-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub template_dir: Option<PathBuf>,

    /// Directory rendered pages are written to.
    #[arg(long = "site-cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct LoggingOverrides {
    /// trace, debug, info, warn or error.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
