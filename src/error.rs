// src/error.rs

//! Error types for the verification pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while verifying packages
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the standard library
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with additional context
    #[error("I/O error: {0}")]
    IoError(String),

    /// The lockfile could not be read or parsed
    #[error("Lockfile error: {0}")]
    LockfileError(String),

    /// A registry download failed
    #[error("Download error: {0}")]
    DownloadError(String),

    /// A published archive does not match the lockfile checksum
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A crate archive is unreadable or lacks a required entry
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Metadata inside an archive could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The resolution policy is malformed
    #[error("Policy error: {0}")]
    PolicyError(String),

    /// The configuration file is malformed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Clone or checkout of a source repository failed
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// An external tool could not be run
    #[error("Tool error: {0}")]
    ToolError(String),

    /// Failed to initialize a component
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl Error {
    /// Whether this error only aborts the current package rather than the run
    pub fn is_package_local(&self) -> bool {
        matches!(self, Self::FetchError(_))
    }
}
