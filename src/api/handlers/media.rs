use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::media::MediaError;
use crate::AppState;

/// Stream the stored package.
/// Route: GET /media/:name
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let (file, byte_size) = state.slot.media().open(&name).await.map_err(|e| match e {
        MediaError::NotFound(_) => ApiError::not_found("File not found"),
        _ => {
            tracing::error!(stored_name = %name, error = %e, "Failed to open stored file");
            ApiError::internal("Failed to retrieve file")
        }
    })?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(byte_size));

    if let Ok(value) = format!("attachment; filename=\"{}\"", name.replace('"', "")).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Stored names are unique per upload, so a name never changes content.
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    Ok(response)
}
