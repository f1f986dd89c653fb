//! Race error types

use std::time::Duration;
use thiserror::Error;

/// Why a race did not yield the work's output
///
/// Errors produced by the work itself are never mapped here; they come back
/// inside `Ok` as part of the work's own output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    /// The deadline fired before the work completed
    #[error("deadline of {0:?} elapsed before work completed")]
    Timeout(Duration),

    /// The caller's token was cancelled first
    #[error("race cancelled by caller")]
    Cancelled,

    /// The work task panicked
    #[error("work panicked: {0}")]
    WorkPanicked(String),
}

impl RaceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
