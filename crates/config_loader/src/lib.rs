//! # Config Loader
//!
//! Reads a pipeline configuration (TOML or JSON), validates it and hands
//! back a [`PipelineConfig`].
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! println!("watchdog window: {:?}", config.watchdog.correction_window());
//! ```

mod parser;
mod validator;

pub use contracts::PipelineConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Stateless entry point for loading and writing configs
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config file, picking the format from its extension
    ///
    /// # Errors
    /// Unknown extension, unreadable file, malformed content, or a config
    /// that fails validation.
    pub fn load_from_path(path: &Path) -> Result<PipelineConfig, ContractError> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ConfigFormat::from_extension)
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "cannot infer config format of {} (expected .toml or .json)",
                    path.display()
                ))
            })?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate in-memory config text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    pub fn to_toml(config: &PipelineConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse_from("cannot render config as TOML", e))
    }

    pub fn to_json(config: &PipelineConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse_from("cannot render config as JSON", e))
    }
}
