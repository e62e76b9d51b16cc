//! Error types for the binary cache codec.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache image violates a structural invariant.
    #[error("corrupt cache: {0}")]
    Corrupt(String),

    /// A serialized commodity symbol is already present in the journal.
    #[error("duplicate commodity symbol {0:?}")]
    DuplicateCommodity(String),

    /// A string field exceeds what the length prefix can express.
    #[error("string of {0} bytes exceeds the 65535-byte format limit")]
    StringTooLong(usize),
}

impl CacheError {
    /// Create a structural-corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        CacheError::Corrupt(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
