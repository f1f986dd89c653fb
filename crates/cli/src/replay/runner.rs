//! Replay orchestrator - wires storage, dedup, dispatcher, sinks and watchdog.

use std::time::Duration;

use contracts::{Event, InstallContext, PipelineConfig, SharedStorage, SinkConfig};
use dispatcher::{create_sink_handles, open_storage, Dispatcher, DispatcherError, Tracker};
use observability::DeliveryAggregator;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use watchdog::{ScreenContext, WatchdogHandle, WatchdogTracker};

use super::{ReplayStats, ScriptEntry};
use crate::error::CliError;

/// Storage key of the launch counter
const LAUNCH_COUNT_KEY: &str = "launchCount";

/// Replay options
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Delay before sinks are started
    pub setup_delay: Duration,
    pub app_id: String,
    pub app_version: String,
    /// Print each delivered event to stdout
    pub print_events: bool,
}

/// Run `script` through a fresh pipeline built from `config`
///
/// Sinks are started concurrently with the script, after `setup_delay`, so
/// early entries exercise the buffer.
#[instrument(name = "replay", skip_all, fields(entries = script.len()))]
pub async fn replay(
    config: &PipelineConfig,
    script: Vec<ScriptEntry>,
    options: ReplayOptions,
) -> Result<ReplayStats, CliError> {
    let start = Instant::now();

    let storage = open_storage(&config.storage).map_err(|e| CliError::replay(e.to_string()))?;
    let launch_count = storage
        .increment(LAUNCH_COUNT_KEY)
        .map_err(|e| CliError::replay(e.to_string()))?;
    let context = InstallContext {
        app_id: options.app_id.clone(),
        app_version: options.app_version.clone(),
        launch_count,
    };
    info!(
        app_id = %context.app_id,
        launch_count,
        first_launch = context.is_first_launch(),
        "Pipeline starting"
    );

    let dispatcher = Dispatcher::spawn();
    let tracker = Tracker::new(dispatcher.handle(), storage.clone());
    let mut tap = tracker.subscribe();
    let watchdog = WatchdogTracker::new(config.watchdog.clone(), tracker.callback());

    let setup = spawn_setup(
        tracker.clone(),
        config.sinks.clone(),
        context,
        storage,
        options.setup_delay,
    );

    let mut stats = ReplayStats {
        launch_count,
        ..ReplayStats::default()
    };
    let watchdogs = play(&script, &tracker, &watchdog, &mut stats).await;

    let flushed = match setup.await {
        Ok(Ok(flushed)) => flushed,
        Ok(Err(e)) => {
            dispatcher.shutdown().await;
            return Err(CliError::replay(format!("sink setup failed: {e}")));
        }
        Err(e) => {
            dispatcher.shutdown().await;
            return Err(CliError::replay(format!("sink setup task failed: {e}")));
        }
    };
    stats.flushed = flushed;

    settle_watchdogs(watchdogs, &mut stats).await;
    dispatcher.shutdown().await;

    let mut aggregator = DeliveryAggregator::new();
    for event in tap.drain() {
        if options.print_events {
            println!("{event}");
        }
        aggregator.update(&event);
    }
    stats.delivery = aggregator.summary();
    stats.duration = start.elapsed();

    info!(
        delivered = stats.delivery.total_events,
        suppressed = stats.events_suppressed,
        "Replay finished"
    );
    Ok(stats)
}

fn spawn_setup(
    tracker: Tracker,
    sinks: Vec<SinkConfig>,
    context: InstallContext,
    storage: SharedStorage,
    delay: Duration,
) -> JoinHandle<Result<usize, DispatcherError>> {
    tokio::spawn(async move {
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Delaying sink setup");
            tokio::time::sleep(delay).await;
        }
        let handles = create_sink_handles(&sinks, &context, &storage).await?;
        let flushed = tracker.setup_sinks(handles).await?;
        info!(sinks = sinks.len(), flushed, "Sinks ready");
        Ok(flushed)
    })
}

async fn play(
    script: &[ScriptEntry],
    tracker: &Tracker,
    watchdog: &WatchdogTracker,
    stats: &mut ReplayStats,
) -> Vec<WatchdogHandle> {
    let mut watchdogs = Vec::new();

    for entry in script {
        match entry {
            ScriptEntry::Event {
                name,
                params,
                condition,
            } => {
                let event = Event::with_params(name.clone(), params.clone());
                if tracker.log(event, *condition) {
                    stats.events_logged += 1;
                } else {
                    stats.events_suppressed += 1;
                }
            }
            ScriptEntry::Property { name, value } => {
                tracker.set_property(name.clone(), value.clone());
                stats.properties += 1;
            }
            ScriptEntry::Screen {
                name,
                expect_ms,
                params,
            } => {
                watchdog.context_shown();
                stats.screens += 1;
                if let Some(ms) = expect_ms {
                    let context = ScreenContext {
                        screen: name.clone(),
                        params: params.clone(),
                    };
                    watchdogs.push(watchdog.arm(context, Duration::from_millis(*ms)));
                }
            }
            ScriptEntry::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
    }

    watchdogs
}

/// Cancel whatever is still running and tally final states
async fn settle_watchdogs(watchdogs: Vec<WatchdogHandle>, stats: &mut ReplayStats) {
    for handle in watchdogs {
        if !handle.state().is_terminal() {
            stats.watchdogs_pending += 1;
            handle.cancel();
        }
        match handle.join().await {
            Ok(state) => {
                *stats
                    .watchdog_outcomes
                    .entry(state.to_string())
                    .or_insert(0) += 1;
            }
            Err(e) => warn!(error = %e, "Watchdog did not finish cleanly"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EventLogCondition, SinkType, StorageConfig};
    use std::collections::HashMap;

    fn options(setup_delay_ms: u64) -> ReplayOptions {
        ReplayOptions {
            setup_delay: Duration::from_millis(setup_delay_ms),
            app_id: "test".to_string(),
            app_version: "1.0.0".to_string(),
            print_events: false,
        }
    }

    fn config_with_store(path: std::path::PathBuf) -> PipelineConfig {
        PipelineConfig {
            storage: StorageConfig {
                prefix: "test".to_string(),
                path: Some(path),
            },
            sinks: vec![SinkConfig {
                name: "recorder".to_string(),
                sink_type: SinkType::Memory,
                params: HashMap::new(),
            }],
            ..PipelineConfig::default()
        }
    }

    fn event(name: &str, condition: EventLogCondition) -> ScriptEntry {
        ScriptEntry::Event {
            name: name.to_string(),
            params: Default::default(),
            condition,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_buffers_until_sinks_are_ready() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(dir.path().join("store.json"));
        let script = vec![
            event("app_open", EventLogCondition::Always),
            event("tutorial", EventLogCondition::OncePerSession),
            event("tutorial", EventLogCondition::OncePerSession),
            ScriptEntry::Sleep { ms: 500 },
            event("late", EventLogCondition::Always),
        ];

        let stats = replay(&config, script, options(200)).await.unwrap();

        assert_eq!(stats.launch_count, 1);
        assert_eq!(stats.events_logged, 3);
        assert_eq!(stats.events_suppressed, 1);
        assert_eq!(stats.flushed, 2);
        assert_eq!(stats.delivery.total_events, 3);
        assert_eq!(stats.delivery.flushed_events, 2);
    }

    #[tokio::test]
    async fn test_replay_lifetime_dedup_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_store(dir.path().join("store.json"));
        let script = vec![event("signup", EventLogCondition::OncePerLifetime)];

        let first = replay(&config, script.clone(), options(0)).await.unwrap();
        assert_eq!(first.delivery.total_events, 1);

        let second = replay(&config, script, options(0)).await.unwrap();
        assert_eq!(second.launch_count, 2);
        assert_eq!(second.events_suppressed, 1);
        assert_eq!(second.delivery.total_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_reports_stuck_screen() {
        let config = PipelineConfig {
            sinks: vec![SinkConfig {
                name: "recorder".to_string(),
                sink_type: SinkType::Memory,
                params: HashMap::new(),
            }],
            ..PipelineConfig::default()
        };
        let script = vec![
            ScriptEntry::Screen {
                name: "checkout".to_string(),
                expect_ms: Some(1000),
                params: Default::default(),
            },
            ScriptEntry::Sleep { ms: 1500 },
            ScriptEntry::Screen {
                name: "receipt".to_string(),
                expect_ms: None,
                params: Default::default(),
            },
            ScriptEntry::Sleep { ms: 10 },
        ];

        let stats = replay(&config, script, options(0)).await.unwrap();

        assert_eq!(stats.delivery.event_counts.get("ui_stuck"), Some(&1));
        assert_eq!(stats.delivery.event_counts.get("ui_stuck_corrected"), Some(&1));
        assert_eq!(stats.watchdog_outcomes.get("resolved"), Some(&1));
    }

    #[tokio::test]
    async fn test_replay_fails_when_sink_cannot_start() {
        let config = PipelineConfig {
            sinks: vec![SinkConfig {
                name: "collector".to_string(),
                sink_type: SinkType::Udp,
                params: HashMap::new(),
            }],
            ..PipelineConfig::default()
        };

        let result = replay(&config, Vec::new(), options(0)).await;
        assert!(matches!(result, Err(CliError::Replay { .. })));
    }
}
