//! DispatchBlueprint - Config Loader output
//!
//! Describes a complete dispatch deployment: document repository, article
//! search backend, engine limits, connector settings and observability.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::HookType;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Feed/Webhook document store
    #[validate(nested)]
    pub repository: RepositoryConfig,

    /// Article search backend
    #[validate(nested)]
    pub search: SearchConfig,

    /// Engine concurrency and retry bounds
    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    /// Connector settings shared by every provider
    #[serde(default)]
    #[validate(nested)]
    pub connectors: ConnectorSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Backend implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CouchDB (repository) or Elasticsearch (search)
    #[default]
    Remote,
    /// In-memory store seeded from a fixtures file
    Memory,
}

/// Document repository configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// CouchDB server URL (may embed credentials)
    #[serde(default = "default_couchdb_url")]
    #[validate(url)]
    pub url: String,

    /// Database name
    #[serde(default = "default_couchdb_name")]
    #[validate(length(min = 1))]
    pub database: String,

    #[serde(default = "default_backend_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    /// Fixtures file for the memory backend
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: default_couchdb_url(),
            database: default_couchdb_name(),
            request_timeout_secs: default_backend_timeout(),
            fixtures: None,
        }
    }
}

fn default_couchdb_url() -> String {
    "http://localhost:5984/".to_string()
}

fn default_couchdb_name() -> String {
    "osinter_users".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

/// Article search configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Elasticsearch URL
    #[serde(default = "default_elastic_url")]
    #[validate(url)]
    pub url: String,

    /// Article index name
    #[serde(default = "default_article_index")]
    #[validate(length(min = 1))]
    pub index: String,

    #[serde(default = "default_backend_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    /// Fixtures file for the memory backend
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: default_elastic_url(),
            index: default_article_index(),
            request_timeout_secs: default_backend_timeout(),
            fixtures: None,
        }
    }
}

fn default_elastic_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_article_index() -> String {
    "osinter_articles".to_string()
}

/// Engine bounds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Concurrent article fetches (independent of feed count)
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 256))]
    pub fetch_workers: usize,

    /// Concurrent webhook send tasks
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 256))]
    pub send_workers: usize,

    /// Upper bound of the article window fetched per feed
    #[serde(default = "default_max_window")]
    #[validate(range(min = 1, max = 10000))]
    pub max_window: u32,

    /// Cursor commit attempts before giving up for this run
    #[serde(default = "default_commit_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub commit_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_workers: default_workers(),
            send_workers: default_workers(),
            max_window: default_max_window(),
            commit_max_attempts: default_commit_attempts(),
        }
    }
}

fn default_workers() -> usize {
    20
}

fn default_max_window() -> u32 {
    50
}

fn default_commit_attempts() -> u32 {
    3
}

/// Settings shared by the connectors
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConnectorSettings {
    /// Provider types to register
    #[serde(default = "default_enabled")]
    pub enabled: Vec<HookType>,

    /// Base URL of the rendered article page (`{base}/{article_id}`)
    #[serde(default = "default_article_render_url")]
    #[validate(url)]
    pub article_render_url: String,

    /// Logo used to replace images rejected by a provider
    #[serde(default = "default_logo_url")]
    #[validate(url)]
    pub full_logo_url: String,

    /// Avatar shown next to bot messages
    #[serde(default = "default_logo_url")]
    #[validate(url)]
    pub small_logo_url: String,

    /// Display name of the bot user
    #[serde(default = "default_username")]
    #[validate(length(min = 1, max = 80))]
    pub username: String,

    /// Per-request timeout for provider calls
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Slack rate-limit (HTTP 429) retries per message
    #[serde(default = "default_rate_limit_retries")]
    #[validate(range(max = 50))]
    pub slack_rate_limit_retries: u32,

    /// Upper bound on a single Slack `Retry-After` wait
    #[serde(default = "default_max_retry_after")]
    #[validate(range(min = 1, max = 3600))]
    pub slack_max_retry_after_secs: u64,

    /// Slack resends after replacing a rejected image
    #[serde(default = "default_three")]
    #[validate(range(max = 10))]
    pub slack_image_retries: u32,

    /// Teams attempts per destination
    #[serde(default = "default_three")]
    #[validate(range(min = 1, max = 10))]
    pub teams_max_attempts: u32,

    /// Attempts of the initialisation message during validation
    #[serde(default = "default_three")]
    #[validate(range(min = 1, max = 10))]
    pub validate_attempts: u32,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            article_render_url: default_article_render_url(),
            full_logo_url: default_logo_url(),
            small_logo_url: default_logo_url(),
            username: default_username(),
            request_timeout_secs: default_request_timeout(),
            slack_rate_limit_retries: default_rate_limit_retries(),
            slack_max_retry_after_secs: default_max_retry_after(),
            slack_image_retries: default_three(),
            teams_max_attempts: default_three(),
            validate_attempts: default_three(),
        }
    }
}

impl ConnectorSettings {
    /// Link to the rendered article page
    pub fn article_link(&self, article_id: &str) -> String {
        format!(
            "{}/{}",
            self.article_render_url.trim_end_matches('/'),
            article_id
        )
    }
}

fn default_enabled() -> Vec<HookType> {
    HookType::BUILTIN.to_vec()
}

fn default_article_render_url() -> String {
    "https://osinter.dk/article".to_string()
}

fn default_logo_url() -> String {
    "https://osinter.dk/fullLogo.png".to_string()
}

fn default_username() -> String {
    "OSINTer".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_rate_limit_retries() -> u32 {
    10
}

fn default_max_retry_after() -> u64 {
    30
}

fn default_three() -> u32 {
    3
}

/// Observability settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Prometheus exporter port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}
