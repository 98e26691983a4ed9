//! Error types for the CLI

use core_types::UcError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or running usecode failed
    #[error("usecode error: {0}")]
    Usecode(#[from] UcError),

    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// Machine configuration could not be parsed
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The entry process could not be created
    #[error("cannot start {class_id:04X}:{offset:04X}")]
    Spawn {
        /// Entry class
        class_id: u16,
        /// Entry offset
        offset: u16,
    },
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
