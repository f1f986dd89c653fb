//! Watchdog error types

use deadline::RaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchdogError {
    /// A timer phase ended in a way the state machine cannot map
    #[error("watchdog race failed: {0}")]
    Race(#[from] RaceError),

    /// The instance task panicked or was aborted
    #[error("watchdog task failed: {0}")]
    TaskFailed(String),
}
