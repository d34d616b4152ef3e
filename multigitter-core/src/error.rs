//! Error types for multigitter

use std::path::PathBuf;

use thiserror::Error;

use crate::git::CloneAttempt;

/// Result type alias for multigitter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for multigitter operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Caller supplied a branch/base combination that can never succeed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Requested ref or file is absent on the remote
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ref creation lost a race against another creator
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Conditional write was rejected because the file changed since it was read
    #[error("Revision marker mismatch while writing {path}")]
    MarkerMismatch {
        /// File path that was being written
        path: String,
    },

    /// File write kept losing the race until the attempt budget ran out
    #[error("Conflict writing {path}: file changed concurrently on all {attempts} attempts")]
    Conflict {
        /// File path that was being written
        path: String,
        /// Number of read-modify-write cycles performed
        attempts: u32,
    },

    /// Every clone attempt failed
    #[error(
        "Clone of {url} failed after {} attempts: {}",
        .attempts.len(),
        describe_attempts(.attempts)
    )]
    FetchExhausted {
        /// Remote that was being cloned
        url: String,
        /// Every failed attempt, in order
        attempts: Vec<CloneAttempt>,
    },

    /// A failed clone attempt left a destination that could not be removed
    #[error(
        "Failed to clean up {} after a failed clone: {reason}; {}",
        .destination.display(),
        describe_attempts(.attempts)
    )]
    CleanupFailed {
        /// Directory that could not be removed
        destination: PathBuf,
        /// Why removal failed
        reason: String,
        /// Attempts made so far, the last one being the one that left the debris
        attempts: Vec<CloneAttempt>,
    },

    /// External cancellation was observed between attempts
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unclassified failure reported by a remote service
    #[error("Remote error: {0}")]
    Remote(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn describe_attempts(attempts: &[CloneAttempt]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
