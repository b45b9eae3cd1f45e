//! Error types for the ef toolkit
//!
//! Library crates return [`Result`]; the command-line front end wraps these
//! in `anyhow` context chains.

use thiserror::Error;

/// Main error type for ef operations
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in an input file
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Structurally invalid network or demand data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration value or syntax
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}

/// Convenience result type for ef operations
pub type Result<T> = std::result::Result<T, Error>;
