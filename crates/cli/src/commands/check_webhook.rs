//! `check-webhook` command implementation.

use anyhow::{Context, Result};
use connectors::ConnectorRegistry;
use contracts::{ConnectorSettings, HookType};
use tracing::info;

use super::load_blueprint;
use crate::cli::CheckWebhookArgs;
use crate::error::CliError;

/// Execute the `check-webhook` command
///
/// Sends the provider's initialisation message; fails if it is not accepted.
pub async fn run_check_webhook(args: &CheckWebhookArgs) -> Result<()> {
    let settings = match args.config {
        Some(ref path) => load_blueprint(path)?.connectors,
        None => ConnectorSettings::default(),
    };

    let registry =
        ConnectorRegistry::from_settings(&settings).context("Failed to initialize connectors")?;
    let hook_type = HookType::from(args.hook_type.as_str());
    let connector = registry
        .get(&hook_type)
        .ok_or_else(|| CliError::unsupported_hook_type(hook_type.as_str()))?;

    info!(hook_type = %hook_type, "Checking webhook");

    if connector.validate(&args.url).await {
        println!("✓ {} webhook accepted the initialisation message", hook_type);
        Ok(())
    } else {
        Err(CliError::webhook_rejected(hook_type.as_str()).into())
    }
}
