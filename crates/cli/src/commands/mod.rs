//! Command implementations.

mod check_webhook;
mod info;
mod run;
mod validate;

pub use check_webhook::run_check_webhook;
pub use info::run_info;
pub use run::run_dispatch;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::DispatchBlueprint;

use crate::error::CliError;

/// Load and validate a configuration file
fn load_blueprint(path: &Path) -> Result<DispatchBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
