use std::path::PathBuf;

use thiserror::Error;

/// Failures that are reported to the user. Per-item pipeline failures never
/// become a `GridError`; they only leave a cell without an image.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("no eligible media files in {dir:?}")]
    NoMedia { dir: PathBuf },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to determine a cache directory")]
    CacheDir,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GridError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
