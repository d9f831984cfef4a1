//! Error types shared by the reorganization modes and the action log.
//!
//! Failures that concern a single file never surface here: they are reported
//! as [`Skipped`](crate::organize::Skipped) items so a run can carry on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading or writing the persisted action log.
#[derive(Debug, Error)]
pub enum ActionLogError {
    #[error("action log I/O failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {waited:?} waiting for the action log lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },
    #[error("failed to encode action log: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ActionLogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a whole reorganization run.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The target is missing or is not a directory. No work was attempted.
    #[error("invalid base path {}: {source}", path.display())]
    InvalidBasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to create a destination directory.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to move a file to its destination.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The run found nothing to move.
    #[error("nothing to do")]
    NothingToDo,
    #[error(transparent)]
    ActionLog(#[from] ActionLogError),
}

impl OrganizeError {
    pub(crate) fn invalid_base(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InvalidBasePath {
            path: path.into(),
            source,
        }
    }
}

/// Result type for reorganization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;
