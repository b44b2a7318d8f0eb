use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing the package currently held in the upload slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Original client-supplied name (untrusted)
    pub file_name: String,
    pub file_url: String,
    /// Extension of the original name, not a sniffed content type
    pub mime_type: String,
    /// Size in MiB, rounded to 2 decimals
    pub file_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk_version: Option<String>,
}

/// The single row stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    /// Name of the artifact inside the media directory
    pub stored_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub descriptor: FileDescriptor,
}
