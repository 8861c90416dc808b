//! Pipeline orchestrator - wires backends, connectors and the dispatcher.

use std::sync::Arc;

use anyhow::{Context, Result};
use backends::{RepositoryBackend, SearchBackend};
use connectors::ConnectorRegistry;
use contracts::{DispatchBlueprint, RunReport};
use dispatcher::Dispatcher;
use tracing::{debug, info};

/// Dispatcher built from a blueprint
pub struct DispatchPipeline {
    dispatcher: Dispatcher<RepositoryBackend, SearchBackend>,
}

impl DispatchPipeline {
    /// Build backends and connectors selected by the configuration
    pub fn build(blueprint: &DispatchBlueprint) -> Result<Self> {
        let repository = RepositoryBackend::from_config(&blueprint.repository)
            .context("Failed to initialize feed repository")?;
        let search = SearchBackend::from_config(&blueprint.search)
            .context("Failed to initialize article search")?;
        let registry = ConnectorRegistry::from_settings(&blueprint.connectors)
            .context("Failed to initialize connectors")?;

        info!(
            repository = ?blueprint.repository.kind,
            search = ?blueprint.search.kind,
            connectors = ?registry.hook_types(),
            fetch_workers = blueprint.engine.fetch_workers,
            send_workers = blueprint.engine.send_workers,
            "Pipeline initialized"
        );

        Ok(Self {
            dispatcher: Dispatcher::new(
                Arc::new(repository),
                Arc::new(search),
                registry,
                blueprint.engine.clone(),
            ),
        })
    }

    /// Run one dispatch pass
    pub async fn run(&self, dry_run: bool) -> Result<RunReport> {
        let report = if dry_run {
            self.dispatcher.dry_run().await
        } else {
            self.dispatcher.run().await
        }
        .context("Dispatch run failed")?;

        for (hook_type, snapshot) in self.dispatcher.registry().metrics() {
            debug!(
                hook_type = %hook_type,
                delivered = snapshot.delivered_count,
                failed = snapshot.failure_count,
                retries = snapshot.retry_count,
                skipped = snapshot.skipped_count,
                "Connector counters"
            );
        }

        Ok(report)
    }
}
