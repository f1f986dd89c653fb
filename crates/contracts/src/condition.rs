//! EventLogCondition - per-event dedup policy

use serde::{Deserialize, Serialize};

/// How many times a named event may be forwarded to sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogCondition {
    /// No gating, every call is forwarded
    #[default]
    Always,
    /// First call ever (across restarts) is forwarded, tracked in the
    /// persisted key-value store
    OncePerLifetime,
    /// First call in this process run is forwarded
    OncePerSession,
}

impl EventLogCondition {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OncePerLifetime => "once_per_lifetime",
            Self::OncePerSession => "once_per_session",
        }
    }
}
