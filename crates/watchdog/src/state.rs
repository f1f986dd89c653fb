//! Watchdog instance states

use std::fmt;

/// Lifecycle of a single armed watchdog
///
/// ```text
/// Armed --D elapses--> Fired --> Correcting --shown within W--> Resolved
///   |                                  |
///   +--shown / superseded / cancel-->  +--W elapses--> Expired
///                Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchdogState {
    Armed,
    Fired,
    Correcting,
    Cancelled,
    Resolved,
    Expired,
}

impl WatchdogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Armed => "armed",
            Self::Fired => "fired",
            Self::Correcting => "correcting",
            Self::Cancelled => "cancelled",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }

    /// No further transitions or events
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Resolved | Self::Expired)
    }
}

impl fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
