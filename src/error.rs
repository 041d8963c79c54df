//! Centralized error types for attache.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the attache library.
#[derive(Error, Debug)]
pub enum AttacheError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The connection to the mail server could not be established.
    #[error("Cannot connect to {server}: {reason}")]
    Connect { server: String, reason: String },

    /// The server rejected the credentials.
    #[error("Authentication failed for '{username}': {reason}")]
    Auth { username: String, reason: String },

    /// Listing the folders failed.
    #[error("Folder enumeration failed: {0}")]
    Enumerate(String),

    /// A folder could not be selected.
    #[error("Cannot select folder '{folder}': {reason}")]
    Select { folder: String, reason: String },

    /// Fetching messages from a folder failed.
    #[error("Fetch of {range} in '{folder}' failed: {reason}")]
    Fetch {
        folder: String,
        range: String,
        reason: String,
    },

    /// The message could not be read as MIME.
    #[error("MIME decoding error: {0}")]
    MimeError(String),

    /// The message has no usable `From:` address.
    #[error("Message has no sender address")]
    MissingSender,

    /// The message has no usable `Date:` header.
    #[error("Message has no valid date")]
    MissingDate,

    /// The fetch response carried no message body.
    #[error("Fetch response for message {0} has no body")]
    MissingBody(u32),

    /// The server did not acknowledge the end of the session.
    #[error("Logout failed: {0}")]
    Logout(String),

    /// A worker thread panicked or a shared lock was poisoned.
    #[error("Internal worker failure: {0}")]
    Worker(String),
}

/// Convenience alias for `Result<T, AttacheError>`.
pub type Result<T> = std::result::Result<T, AttacheError>;

impl AttacheError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors that end the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Connect { .. }
                | Self::Auth { .. }
                | Self::Enumerate(_)
                | Self::Select { .. }
                | Self::Fetch { .. }
                | Self::Worker(_)
        )
    }
}
