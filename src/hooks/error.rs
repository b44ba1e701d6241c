//! Error types for the hooks event bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by watcher construction, lifecycle calls and the producer.
///
/// Transient problems inside a scan pass (unreadable directory, malformed
/// files, files vanishing mid-read) never reach this type.
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Invalid hooks configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watcher for session '{session_id}' is already running")]
    AlreadyRunning { session_id: String },

    #[error("Watcher must be started from within a Tokio runtime")]
    NoRuntime,

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to initialize event source: {reason}")]
    SourceInit { reason: String },
}

impl HookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HookError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<notify::Error> for HookError {
    fn from(e: notify::Error) -> Self {
        HookError::SourceInit {
            reason: e.to_string(),
        }
    }
}
