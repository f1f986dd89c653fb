//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{PipelineConfig, SinkType};
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
    storage_prefix: String,
    persistent_storage: bool,
    correction_window_ms: u64,
    sink_count: usize,
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

impl ValidationResult {
    fn failed(config_path: String, error: String) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        }
    }

    fn passed(config_path: String, config: &PipelineConfig) -> Self {
        let warnings = collect_warnings(config);
        Self {
            valid: true,
            config_path,
            error: None,
            warnings: (!warnings.is_empty()).then_some(warnings),
            summary: Some(ConfigSummary {
                version: format!("{:?}", config.version),
                storage_prefix: config.storage.prefix.clone(),
                persistent_storage: config.storage.path.is_some(),
                correction_window_ms: config.watchdog.correction_window_ms,
                sink_count: config.sinks.len(),
            }),
        }
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        let error = format!("File not found: {config_path}");
        return ValidationResult::failed(config_path, error);
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => ValidationResult::passed(config_path, &config),
        Err(e) => ValidationResult::failed(config_path, e.to_string()),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push(
            "No sinks configured - events stay buffered and are dropped on exit".to_string(),
        );
    }

    if config.storage.path.is_none() {
        warnings.push(
            "storage.path not set - once_per_lifetime events repeat on every run".to_string(),
        );
    }

    if !config.sinks.is_empty()
        && config
            .sinks
            .iter()
            .all(|s| s.sink_type == SinkType::Memory)
    {
        warnings.push("Only memory sinks configured - nothing leaves the process".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Storage prefix: {}", summary.storage_prefix);
            println!("  Persistent storage: {}", summary.persistent_storage);
            println!("  Correction window: {} ms", summary.correction_window_ms);
            println!("  Sinks: {}", summary.sink_count);
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
