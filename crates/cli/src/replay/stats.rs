//! Replay statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use observability::DeliverySummary;

/// Statistics from a replay run
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    /// Launch counter after this run was counted
    pub launch_count: i64,

    /// Events admitted by the dedup policy
    pub events_logged: u64,

    /// Events suppressed by the dedup policy
    pub events_suppressed: u64,

    /// Property updates submitted
    pub properties: u64,

    /// Screens shown
    pub screens: u64,

    /// Events that waited in the buffer for sinks
    pub flushed: usize,

    /// Final watchdog states, by name
    pub watchdog_outcomes: BTreeMap<String, u64>,

    /// Watchdogs still running when the script ended
    pub watchdogs_pending: u64,

    /// Total duration of the replay
    pub duration: Duration,

    /// What reached the sinks
    pub delivery: DeliverySummary,
}

impl ReplayStats {
    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Replay Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Launch count: {}", self.launch_count);
        println!("   ├─ Events logged: {}", self.events_logged);
        println!("   ├─ Events suppressed: {}", self.events_suppressed);
        println!("   ├─ Property updates: {}", self.properties);
        println!("   ├─ Screens shown: {}", self.screens);
        println!("   └─ Flushed after setup: {}", self.flushed);

        if !self.watchdog_outcomes.is_empty() {
            println!("\n⏱️  Watchdogs");
            for (state, count) in &self.watchdog_outcomes {
                println!("   ├─ {}: {}", state, count);
            }
            println!("   └─ still running at end: {}", self.watchdogs_pending);
        }

        println!("\n{}", self.delivery);
    }
}
