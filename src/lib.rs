//! apk-drop - single-slot distribution service for Android packages
//!
//! Holds exactly one uploaded package at a time:
//! - every upload wipes the media directory and the metadata row before anything else
//! - uploads are serialized behind one lock, so the slot never holds two files
//! - metadata lives in redb under a fixed id (ACID, crash-safe)
//! - REST API with streamed multipart upload and a download route

pub mod api;
pub mod config;
pub mod media;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod upload;

use config::Config;
use upload::UploadSlot;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub slot: UploadSlot,
}
