//! The single upload slot: eager cleanup, staging of the incoming package and the
//! metadata replace that publishes it.

mod naming;
mod slot;

pub use naming::{
    apk_version, download_url, extension_of, is_apk, mime_type_of, sanitize_file_name,
    size_in_mib, stored_file_name,
};
pub use slot::{SlotTransaction, StagedFile, UploadSlot};

use thiserror::Error;

use crate::media::MediaError;
use crate::storage::DatabaseError;

/// Multipart field that carries the package.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Validation(String),
    #[error("Only APK files are allowed")]
    InvalidFileType,
    #[error("File too large (limit is {limit} bytes)")]
    PayloadTooLarge { limit: u64 },
    #[error("Could not save file info to database")]
    StorageWriteFailed(#[source] DatabaseError),
    #[error("Could not fetch uploaded file")]
    StorageReadFailed(#[source] DatabaseError),
    #[error("Could not clean media directory: {0}")]
    DirectoryCleanupFailed(#[source] MediaError),
    #[error("Could not store uploaded file: {0}")]
    Io(#[from] MediaError),
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::Io(MediaError::Io(e))
    }
}

impl UploadError {
    /// Whether the client caused this (bad request) as opposed to the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            UploadError::Validation(_)
                | UploadError::InvalidFileType
                | UploadError::PayloadTooLarge { .. }
        )
    }
}
