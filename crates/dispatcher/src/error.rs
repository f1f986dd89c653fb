//! Dispatcher error types

use thiserror::Error;

/// Errors from setup and control-plane calls
///
/// Delivery failures never surface here: they are isolated per sink, logged
/// and counted.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be built or started
    #[error("sink '{name}' unavailable: {message}")]
    SinkCreation { name: String, message: String },

    /// The dispatcher task is gone (shut down or panicked)
    #[error("dispatcher is not running")]
    Stopped,

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
