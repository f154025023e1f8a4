//! Error types for the leader epoch subsystem.

use std::io;
use std::path::PathBuf;

/// Errors that can occur in the leader epoch cache.
#[derive(thiserror::Error, Debug)]
pub enum EpochError {
    /// Filesystem I/O error while reading or writing the checkpoint.
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),

    /// The checkpoint file exists but its content is malformed.
    ///
    /// Covers unknown versions, bad counts, and unparseable entry lines.
    /// A corrupt checkpoint is never silently discarded: a partition whose
    /// epoch history cannot be loaded cannot safely participate in
    /// replication.
    #[error("corrupt leader epoch checkpoint {}: {reason}", .path.display())]
    CorruptCheckpoint { path: PathBuf, reason: String },

    /// The caller violated a precondition, e.g. assigning a negative epoch.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for leader epoch operations.
pub type Result<T> = std::result::Result<T, EpochError>;
