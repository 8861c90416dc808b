//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Feed Dispatch - deliver new feed articles to webhooks
#[derive(Parser, Debug)]
#[command(
    name = "feed-dispatch",
    author,
    version,
    about = "Feed webhook dispatch engine",
    long_about = "Batch job that finds articles published since each feed's cursor,\n\n\
                  delivers them to the feed's Discord, Slack and Teams webhooks, \n\
                  and advances the cursors under optimistic concurrency."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FEED_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FEED_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one dispatch pass
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Send the initialisation message to a webhook URL
    CheckWebhook(CheckWebhookArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "FEED_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Resolve and log what would be sent without sending or committing
    #[arg(long)]
    pub dry_run: bool,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "FEED_DISPATCH_TIMEOUT")]
    pub timeout: u64,

    /// Override the CouchDB URL from configuration
    #[arg(long, env = "COUCHDB_URL")]
    pub repository_url: Option<String>,

    /// Override the Elasticsearch URL from configuration
    #[arg(long, env = "ELASTICSEARCH_URL")]
    pub search_url: Option<String>,

    /// Metrics server port, overrides `observability.metrics_port`
    #[arg(long, env = "FEED_DISPATCH_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "FEED_DISPATCH_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "FEED_DISPATCH_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `check-webhook` command
#[derive(Parser, Debug)]
pub struct CheckWebhookArgs {
    /// Provider type (discord, slack, teams)
    #[arg(long)]
    pub hook_type: String,

    /// Webhook URL to check
    #[arg(long)]
    pub url: String,

    /// Configuration file for connector settings (defaults if omitted)
    #[arg(short, long, env = "FEED_DISPATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
