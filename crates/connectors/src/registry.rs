//! ConnectorRegistry - HookType → Connector lookup

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{Connector, ConnectorSettings, HookType};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::ConnectorError;
use crate::http::build_client;
use crate::metrics::{ConnectorMetrics, MetricsSnapshot};
use crate::providers::{DiscordConnector, SlackConnector, TeamsConnector};

/// Registered connector with its metrics
struct Entry {
    connector: Arc<dyn Connector>,
    metrics: Arc<ConnectorMetrics>,
}

/// Registry of connectors keyed by provider type
///
/// Built once at startup and shared read-only by the dispatcher.
#[derive(Default)]
pub struct ConnectorRegistry {
    entries: HashMap<HookType, Entry>,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the built-in connectors listed in `settings.enabled`
    ///
    /// All connectors share one HTTP client.
    #[instrument(
        name = "connector_registry_from_settings",
        skip(settings),
        fields(enabled = settings.enabled.len())
    )]
    pub fn from_settings(settings: &ConnectorSettings) -> Result<Self, ConnectorError> {
        let client = build_client(Duration::from_secs(settings.request_timeout_secs))?;
        let settings = Arc::new(settings.clone());

        let mut registry = Self::new();
        for hook_type in &settings.enabled {
            let metrics = Arc::new(ConnectorMetrics::new());
            let connector = create_connector(hook_type, &client, &settings, &metrics)?;
            registry.insert(connector, metrics);
        }

        debug!(connectors = registry.len(), "Connector registry built");
        Ok(registry)
    }

    /// Register a connector under its own hook type
    ///
    /// Replaces any connector previously registered for that type.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.insert(connector, Arc::new(ConnectorMetrics::new()));
    }

    fn insert(&mut self, connector: Arc<dyn Connector>, metrics: Arc<ConnectorMetrics>) {
        self.entries.insert(
            connector.hook_type(),
            Entry {
                connector,
                metrics,
            },
        );
    }

    pub fn get(&self, hook_type: &HookType) -> Option<Arc<dyn Connector>> {
        self.entries
            .get(hook_type)
            .map(|entry| Arc::clone(&entry.connector))
    }

    pub fn supports(&self, hook_type: &HookType) -> bool {
        self.entries.contains_key(hook_type)
    }

    /// Registered hook types, sorted by name
    pub fn hook_types(&self) -> Vec<HookType> {
        let mut types: Vec<_> = self.entries.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metrics snapshot per registered connector
    pub fn metrics(&self) -> Vec<(HookType, MetricsSnapshot)> {
        self.hook_types()
            .into_iter()
            .filter_map(|hook_type| {
                let snapshot = self.entries.get(&hook_type)?.metrics.snapshot();
                Some((hook_type, snapshot))
            })
            .collect()
    }
}

fn create_connector(
    hook_type: &HookType,
    client: &Client,
    settings: &Arc<ConnectorSettings>,
    metrics: &Arc<ConnectorMetrics>,
) -> Result<Arc<dyn Connector>, ConnectorError> {
    let client = client.clone();
    let settings = Arc::clone(settings);
    let metrics = Arc::clone(metrics);

    match hook_type {
        HookType::Discord => Ok(Arc::new(DiscordConnector::new(client, settings, metrics))),
        HookType::Slack => Ok(Arc::new(SlackConnector::new(client, settings, metrics))),
        HookType::Teams => Ok(Arc::new(TeamsConnector::new(client, settings, metrics))),
        HookType::Other(name) => Err(ConnectorError::unknown_provider(name)),
    }
}
