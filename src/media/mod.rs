mod local;

pub use local::{MediaDir, PurgeStats};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Media not found: {0}")]
    NotFound(String),
    #[error("Could not read media directory {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
}
