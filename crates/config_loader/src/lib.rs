//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `DispatchBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Database: {}", blueprint.repository.database);
//! ```

mod parser;
mod validator;

pub use contracts::DispatchBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Relative fixtures paths are resolved against the file's directory.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DispatchBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let mut blueprint = Self::load_from_str(&content, format)?;

        if let Some(base) = path.parent() {
            Self::resolve_fixtures(&mut blueprint, base);
        }
        Ok(blueprint)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<DispatchBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate a blueprint that was modified after loading (CLI overrides)
    pub fn validate(blueprint: &DispatchBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize DispatchBlueprint to TOML string
    pub fn to_toml(blueprint: &DispatchBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize DispatchBlueprint to JSON string
    pub fn to_json(blueprint: &DispatchBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<DispatchBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    fn resolve_fixtures(blueprint: &mut DispatchBlueprint, base: &Path) {
        for fixtures in [
            &mut blueprint.repository.fixtures,
            &mut blueprint.search.fixtures,
        ] {
            if let Some(path) = fixtures.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}
