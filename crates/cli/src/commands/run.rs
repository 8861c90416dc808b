//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::RunReport;
use observability::{record_run_metrics, RunSummary};
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::DispatchPipeline;

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(ref url) = args.repository_url {
        info!("Overriding repository URL from CLI");
        blueprint.repository.url = url.clone();
    }
    if let Some(ref url) = args.search_url {
        info!(url = %url, "Overriding search URL from CLI");
        blueprint.search.url = url.clone();
    }
    config_loader::ConfigLoader::validate(&blueprint)
        .map_err(|e| CliError::config_validation(e.to_string()))?;

    if let Some(port) = args.metrics_port.or(blueprint.observability.metrics_port) {
        observability::init_metrics_only(port)?;
    }

    let pipeline = DispatchPipeline::build(&blueprint)?;
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));

    info!(dry_run = args.dry_run, timeout = ?timeout, "Starting dispatch run");

    let report = tokio::select! {
        result = run_with_timeout(&pipeline, args.dry_run, timeout) => result?,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, abandoning run");
            return Ok(());
        }
    };

    record_run_metrics(&report);

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", json);
    } else {
        println!("{}", RunSummary::from(&report));
    }

    if !report.is_clean() {
        warn!("Dispatch run finished with failures");
    }
    Ok(())
}

async fn run_with_timeout(
    pipeline: &DispatchPipeline,
    dry_run: bool,
    timeout: Option<Duration>,
) -> Result<RunReport> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, pipeline.run(dry_run))
            .await
            .map_err(|_| CliError::timeout(limit.as_secs()))?,
        None => pipeline.run(dry_run).await,
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
