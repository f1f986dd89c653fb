//! Snapshot of the UI context a watchdog guards

use contracts::{Event, EventParams, ParamValue};

/// The screen that was shown plus whatever the caller wants reported
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenContext {
    pub screen: String,
    pub params: EventParams,
}

impl ScreenContext {
    pub fn new(screen: impl Into<String>) -> Self {
        Self {
            screen: screen.into(),
            params: EventParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Diagnostic event carrying this snapshot and `duration` in seconds
    pub(crate) fn to_event(&self, name: &str, duration_secs: f64) -> Event {
        Event::with_params(name, self.params.clone())
            .with_param(crate::SCREEN_PARAM, self.screen.as_str())
            .with_param(crate::DURATION_PARAM, duration_secs)
    }
}
