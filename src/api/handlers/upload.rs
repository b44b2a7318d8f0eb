use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, Success};
use crate::config::Config;
use crate::storage::{FileDescriptor, FileRecord};
use crate::upload::{SlotTransaction, StagedFile, UploadError, FILE_FIELD};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadedFilesResponse {
    pub file: Option<CurrentFile>,
}

/// The stored row as clients see it. Unlike the upload response, a missing
/// `apkVersion` is reported as `null`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentFile {
    pub id: u64,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub file_size: f64,
    pub apk_version: Option<String>,
}

impl From<FileRecord> for CurrentFile {
    fn from(record: FileRecord) -> Self {
        let FileDescriptor {
            file_name,
            file_url,
            mime_type,
            file_size,
            apk_version,
        } = record.descriptor;

        Self {
            id: record.id,
            file_name,
            file_url,
            mime_type,
            file_size,
            apk_version,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Replace the slot's contents with the uploaded package.
/// Route: POST /uploadFile
///
/// The slot is wiped as soon as the request is admitted, before the body is even
/// looked at.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Success<FileDescriptor>>, ApiError> {
    let txn = state.slot.begin().await;

    let multipart = multipart.map_err(|e| UploadError::Validation(e.body_text()))?;
    let staged = receive_file(&txn, multipart).await?;

    let base_url = request_base_url(&state.config, &uri, &headers);
    let descriptor = txn.commit(staged, &base_url).await?;

    Ok(Success::json(descriptor))
}

/// The package currently in the slot, or `null`.
/// Route: GET /uploadedFiles
pub async fn uploaded_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Success<UploadedFilesResponse>>, ApiError> {
    let file = state.slot.current()?.map(CurrentFile::from);
    Ok(Success::json(UploadedFilesResponse { file }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Read the multipart body and stream its one file field to disk.
/// On any error the partially written file is removed.
async fn receive_file<'a>(
    txn: &SlotTransaction<'a>,
    mut multipart: Multipart,
) -> Result<StagedFile<'a>, UploadError> {
    let mut staged: Option<StagedFile<'a>> = None;

    match read_fields(txn, &mut multipart, &mut staged).await {
        Ok(()) => staged.ok_or_else(|| UploadError::Validation("No file uploaded".to_string())),
        Err(e) => {
            if let Some(file) = staged {
                file.abort().await;
            }
            Err(e)
        }
    }
}

async fn read_fields<'a>(
    txn: &SlotTransaction<'a>,
    multipart: &mut Multipart,
    staged: &mut Option<StagedFile<'a>>,
) -> Result<(), UploadError> {
    let limit = txn.max_upload_size();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        // Plain text fields are ignored.
        let Some(original_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        if field.name() != Some(FILE_FIELD) || staged.is_some() {
            return Err(UploadError::Validation("Unexpected field".to_string()));
        }

        let file = staged.insert(txn.stage(&original_name).await?);
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            file.write_chunk(&chunk).await?;
        }

        tracing::debug!(
            file_name = %original_name,
            stored_name = %file.stored_name(),
            byte_size = file.written(),
            "Received upload"
        );
    }

    Ok(())
}

fn multipart_error(e: MultipartError, limit: u64) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::PayloadTooLarge { limit }
    } else {
        UploadError::Validation(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// Scheme and host the client used to reach us, unless overridden by configuration.
fn request_base_url(config: &Config, uri: &Uri, headers: &HeaderMap) -> String {
    if let Some(ref base) = config.public_base_url {
        return base.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(|h| h.to_string())
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| format!("localhost:{}", config.server.port));

    let scheme = uri.scheme_str().unwrap_or("http");
    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, StorageConfig, DEFAULT_MAX_UPLOAD_SIZE};

    fn config(public_base_url: Option<&str>) -> Config {
        Config {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            public_base_url: public_base_url.map(|s| s.to_string()),
            cors_origins: vec!["*".to_string()],
        }
    }

    #[test]
    fn test_base_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "apk.example:2000".parse().unwrap());
        let uri: Uri = "/uploadFile".parse().unwrap();

        assert_eq!(
            request_base_url(&config(None), &uri, &headers),
            "http://apk.example:2000"
        );
    }

    #[test]
    fn test_base_url_override() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "internal:2000".parse().unwrap());
        let uri: Uri = "/uploadFile".parse().unwrap();

        assert_eq!(
            request_base_url(&config(Some("https://downloads.example")), &uri, &headers),
            "https://downloads.example"
        );
    }

    #[test]
    fn test_base_url_without_host() {
        let uri: Uri = "/uploadFile".parse().unwrap();
        assert_eq!(
            request_base_url(&config(None), &uri, &HeaderMap::new()),
            "http://localhost:2000"
        );

        let uri: Uri = "https://h2.example/uploadFile".parse().unwrap();
        assert_eq!(
            request_base_url(&config(None), &uri, &HeaderMap::new()),
            "https://h2.example"
        );
    }
}
