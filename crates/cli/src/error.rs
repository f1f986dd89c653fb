//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Malformed line in a session script
    #[error("Invalid script entry at line {line}: {message}")]
    ScriptParse { line: usize, message: String },

    /// Pipeline could not be assembled or driven
    #[error("Replay failed: {message}")]
    Replay { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn script_parse(line: usize, message: impl Into<String>) -> Self {
        Self::ScriptParse {
            line,
            message: message.into(),
        }
    }

    pub fn replay(message: impl Into<String>) -> Self {
        Self::Replay {
            message: message.into(),
        }
    }
}
