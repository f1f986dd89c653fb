//! `replay` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::ReplayArgs;
use crate::replay::{load_script, replay, ReplayOptions};

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        storage_prefix = %config.storage.prefix,
        persistent = config.storage.path.is_some(),
        sinks = config.sinks.len(),
        "Configuration loaded"
    );

    let script = load_script(&args.events)
        .with_context(|| format!("Failed to load script from {}", args.events.display()))?;
    info!(entries = script.len(), "Script loaded");

    if args.metrics_port != 0 {
        observability::install_prometheus(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let options = ReplayOptions {
        setup_delay: Duration::from_millis(args.setup_delay_ms),
        app_id: args.app_id.clone(),
        app_version: args.app_version.clone(),
        print_events: args.print_events,
    };

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = replay(&config, script, options) => {
            let stats = result.context("Replay failed")?;
            info!(
                delivered = stats.delivery.total_events,
                flushed = stats.flushed,
                duration_secs = stats.duration.as_secs_f64(),
                "Replay completed successfully"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, abandoning replay");
        }
    }

    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
