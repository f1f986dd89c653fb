//! Errors shared by every pipeline crate
//!
//! Three families: configuration, sink lifecycle, persisted storage.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ContractError {
    /// Config text could not be decoded
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Config decoded but is not usable
    #[error("invalid config, {field}: {message}")]
    ConfigValidation { field: String, message: String },

    /// `start` failed; the sink never receives deliveries
    #[error("sink '{sink_name}' failed to start: {message}")]
    SinkStart { sink_name: String, message: String },

    /// A single delivery was rejected
    #[error("sink '{sink_name}' rejected delivery: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Transport-level failure (bind, connect, send)
    #[error("sink '{sink_name}' transport error: {message}")]
    SinkConnection { sink_name: String, message: String },

    #[error("storage error on '{key}': {message}")]
    Storage { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parse error keeping the decoder's error as source
    pub fn config_parse_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn sink_start(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkStart {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }
}
