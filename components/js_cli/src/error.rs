//! Error types for the CLI

use bytecode_system::DecodeError;
use core_types::JsError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O error
    #[error("Could not read '{path}': {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid serialized program
    #[error("Invalid program: {0}")]
    Decode(#[from] DecodeError),

    /// The script threw and nothing caught it
    #[error("{}", .0.format_trace())]
    Uncaught(JsError),
}

impl From<JsError> for CliError {
    fn from(err: JsError) -> Self {
        CliError::Uncaught(err)
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
