//! InstallContext - install-time facts handed to sinks on start

use serde::{Deserialize, Serialize};

/// Snapshot of install/launch facts computed before sinks start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallContext {
    /// Application identifier
    pub app_id: String,

    /// Application version string
    pub app_version: String,

    /// Number of launches including the current one
    pub launch_count: i64,
}

impl InstallContext {
    /// Whether this is the very first launch
    pub fn is_first_launch(&self) -> bool {
        self.launch_count <= 1
    }
}
