//! Error types for tally-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A commodity symbol was registered twice
    #[error("Duplicate commodity symbol: {0}")]
    DuplicateCommodity(String),

    /// An account path could not be resolved
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// No registered parser recognized the input
    #[error("Unrecognized journal format: {0}")]
    UnrecognizedFormat(String),

    /// A parser recognized the input but could not read it
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }
}
