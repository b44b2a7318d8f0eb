//! Shared test helpers for router-level tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use crate::config::{Config, ServerConfig, StorageConfig};
use crate::media::MediaDir;
use crate::storage::Database;
use crate::upload::UploadSlot;
use crate::AppState;

pub const BOUNDARY: &str = "----apkdropboundary7MA4YWxkTrZu0gW";

/// Create a test AppState with a temporary database and media directory.
pub fn test_state(temp_dir: &tempfile::TempDir, max_upload_size: u64) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let media_dir = temp_dir.path().join("media");
    let frontend_dir = temp_dir.path().join("frontend");

    std::fs::create_dir_all(&frontend_dir).expect("Failed to create frontend dir");
    std::fs::write(
        frontend_dir.join("index.html"),
        "<!doctype html><title>apk-drop</title>",
    )
    .expect("Failed to write index.html");

    let config = Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 2000,
        },
        storage: StorageConfig {
            data_dir: data_dir.to_string_lossy().to_string(),
            media_dir: media_dir.to_string_lossy().to_string(),
            frontend_dir: frontend_dir.to_string_lossy().to_string(),
        },
        max_upload_size,
        public_base_url: None,
        cors_origins: vec!["*".to_string()],
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let media = MediaDir::new(&media_dir).expect("Failed to create test media dir");

    Arc::new(AppState {
        slot: UploadSlot::new(db, media, config.max_upload_size),
        config,
    })
}

/// One part of a multipart body.
pub enum Part<'a> {
    File {
        field: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

/// Encode `parts` as a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                field,
                file_name,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/vnd.android.package-archive\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST `body` to /uploadFile as multipart.
pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/uploadFile")
        .header(header::HOST, "localhost:2000")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("Failed to build request")
}

/// Single-file upload request.
pub fn upload_file_request(file_name: &str, data: &[u8]) -> Request<Body> {
    upload_request(multipart_body(&[Part::File {
        field: "file",
        file_name,
        data,
    }]))
}

pub fn get_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, "localhost:2000")
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Send a request through the router and decode the JSON reply (`Null` if not JSON).
pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send_raw(router, req).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub async fn send_raw(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(req)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, bytes.to_vec())
}
