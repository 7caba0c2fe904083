use std::path::PathBuf;

use imagen_core::error::CoreError;

/// Hard failures while preparing a generation request.
///
/// Anything from submission onward is reported through
/// [`JobState`](imagen_core::job_state::JobState) instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid request: {0}")]
    Request(#[from] CoreError),

    #[error("Failed to create directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),
}
