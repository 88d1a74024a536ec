//! Common error types for sndbuf

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for sndbuf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across sndbuf crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file exists but could not be parsed
    #[error("Configuration error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// A required value could not be resolved from any source
    #[error("Missing value: {0}")]
    Missing(String),
}
