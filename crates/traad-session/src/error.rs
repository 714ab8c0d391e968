//! Error types for the traad session facade.
//!
//! Every fallible session operation returns [`SessionError`]. The transport
//! layer relies on this being a closed enum: each variant maps onto a
//! protocol fault without losing the original failure kind.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Project path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No such resource in project: {0}")]
    NoSuchResource(String),

    #[error("Resource is not a folder: {0}")]
    NotAFolder(String),

    #[error("Resource path escapes the project root: {0}")]
    OutsideProject(String),

    #[error("Invalid resource name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl SessionError {
    /// Build an IO variant from a raw error and the path it concerns.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            message: source.to_string(),
            path: Some(path.into()),
            source: Some(source),
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
