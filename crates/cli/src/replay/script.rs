//! Session scripts: one JSON entry per line.
//!
//! ```text
//! {"type":"event","name":"app_open","params":{"cold":true}}
//! {"type":"event","name":"signup","condition":"once_per_lifetime"}
//! {"type":"property","name":"plan","value":"pro"}
//! {"type":"screen","name":"checkout","expect_ms":2000}
//! {"type":"sleep","ms":150}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::path::Path;

use contracts::{EventLogCondition, EventParams};
use serde::Deserialize;

use crate::error::CliError;

/// One scripted step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEntry {
    /// Log an event under a dedup policy
    Event {
        name: String,
        #[serde(default)]
        params: EventParams,
        #[serde(default)]
        condition: EventLogCondition,
    },
    /// Set or clear a user property
    Property {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// A screen became visible; arm a watchdog when `expect_ms` is given
    Screen {
        name: String,
        #[serde(default)]
        expect_ms: Option<u64>,
        #[serde(default)]
        params: EventParams,
    },
    /// Pause the script
    Sleep { ms: u64 },
}

/// Parse a whole script
pub fn parse_script(content: &str) -> Result<Vec<ScriptEntry>, CliError> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str(line).map_err(|e| CliError::script_parse(line_no, e.to_string()))
        })
        .collect()
}

/// Read and parse a script file
pub fn load_script(path: &Path) -> Result<Vec<ScriptEntry>, CliError> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_script(&content)
}
