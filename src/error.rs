//! Error taxonomy for an archive run.
//!
//! Channel-level code returns [`ArchiveError`]; the orchestrator decides which
//! variants are skippable and which abort the run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The session is not allowed to read the requested resource.
    #[error("access forbidden: {0}")]
    Forbidden(String),

    /// A remote call or a channel sync exceeded its time bound.
    #[error("timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    /// Any other failure reported by the history source.
    #[error("remote error: {0}")]
    Remote(String),

    /// Local filesystem failure, with the path that caused it.
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The session could not be established. Fatal for the whole run.
    #[error("session failed: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}
