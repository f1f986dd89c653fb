//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    storage: StorageInfo,
    watchdog: WatchdogInfo,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct StorageInfo {
    prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Serialize)]
struct WatchdogInfo {
    correction_window_ms: u64,
    stuck_event: String,
    corrected_event: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &PipelineConfig, args: &InfoArgs) -> ConfigInfo {
    let sinks = config
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            params: if args.sinks {
                s.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        storage: StorageInfo {
            prefix: config.storage.prefix.clone(),
            path: config
                .storage
                .path
                .as_ref()
                .map(|p| p.display().to_string()),
        },
        watchdog: WatchdogInfo {
            correction_window_ms: config.watchdog.correction_window_ms,
            stuck_event: config.watchdog.stuck_event.clone(),
            corrected_event: config.watchdog.corrected_event.clone(),
        },
        sinks,
    }
}

fn print_config_info(config: &PipelineConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 eventpipe Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Storage
    println!("💾 Storage");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Key prefix: {}", config.storage.prefix);
    match &config.storage.path {
        Some(path) => println!("   └─ File: {}", path.display()),
        None => println!("   └─ File: (in-memory)"),
    }

    // Watchdog
    let watchdog = &config.watchdog;
    println!("\n⏱️  Watchdog");
    println!("   ├─ Correction window: {} ms", watchdog.correction_window_ms);
    println!("   ├─ Stuck event: {}", watchdog.stuck_event);
    println!("   └─ Corrected event: {}", watchdog.corrected_event);

    // Sinks
    println!("\n📤 Sinks ({})", config.sinks.len());
    for (i, sink) in config.sinks.iter().enumerate() {
        let is_last = i == config.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);

        if args.sinks {
            let params: BTreeMap<_, _> = sink.params.iter().collect();
            for (key, value) in params {
                println!("   {}    {} = {}", child_prefix, key, value);
            }
        }
    }

    println!();
}
