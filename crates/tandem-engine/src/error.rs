//! Error types for tandem-engine

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use tandem_registry::Error as RegistryError;

/// Result type alias using tandem-engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// A manifest write that failed during apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedWrite {
    /// Manifest that could not be written
    pub path: PathBuf,
    /// Underlying I/O failure
    pub message: String,
}

impl fmt::Display for FailedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Errors that can occur in tandem-engine
#[derive(Debug, Error)]
pub enum Error {
    /// Workspace root missing, not a directory, or not traversable
    #[error("cannot scan {path}: {reason}")]
    Scan {
        /// Root that was requested
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Malformed manifest
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Offending manifest
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Registry query failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Plan violates a pin guard or references unknown state
    #[error("plan rejected: {0}")]
    Plan(String),

    /// A manifest could not be staged; nothing was written
    #[error("staging failed for {path}: {reason}")]
    Staging {
        /// Manifest that failed to stage
        path: PathBuf,
        /// Why staging failed
        reason: String,
    },

    /// Some manifest writes succeeded and some failed
    #[error("{} of {} manifest writes failed", .failed.len(), .failed.len() + .succeeded.len())]
    PartialApply {
        /// Manifests written successfully
        succeeded: Vec<PathBuf>,
        /// Manifests that could not be written
        failed: Vec<FailedWrite>,
    },

    /// Cancelled before any manifest was written
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid version or version requirement
    #[error("invalid version requirement '{0}': {1}")]
    InvalidVersion(String, String),

    /// Workspace structure error (bad member patterns, missing target manifest)
    #[error("workspace error: {0}")]
    Workspace(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn staging(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Staging {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
