//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BackendKind, DispatchBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    repository: String,
    search: String,
    connectors: Vec<String>,
    fetch_workers: usize,
    send_workers: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    repository: format!("{:?}", blueprint.repository.kind),
                    search: format!("{:?}", blueprint.search.kind),
                    connectors: blueprint
                        .connectors
                        .enabled
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    fetch_workers: blueprint.engine.fetch_workers,
                    send_workers: blueprint.engine.send_workers,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &DispatchBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.repository.kind == BackendKind::Memory {
        warnings.push(
            "In-memory repository - committed cursors are lost when the process exits"
                .to_string(),
        );
    }

    let repository = &blueprint.repository.url;
    if repository.starts_with("http://") && repository.contains('@') {
        warnings.push("Repository credentials are sent over plain http".to_string());
    }

    for hook_type in contracts::HookType::BUILTIN {
        if !blueprint.connectors.enabled.contains(&hook_type) {
            warnings.push(format!(
                "Connector '{hook_type}' disabled - its webhooks will be skipped"
            ));
        }
    }

    if blueprint.engine.max_window < 10 {
        warnings.push(format!(
            "engine.max_window is {} - a burst of articles may push the cursor out of the window",
            blueprint.engine.max_window
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Repository: {}", summary.repository);
            println!("  Search: {}", summary.search);
            println!("  Connectors: {}", summary.connectors.join(", "));
            println!(
                "  Workers: {} fetch / {} send",
                summary.fetch_workers, summary.send_workers
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
