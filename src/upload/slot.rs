use chrono::Utc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

use super::naming::{
    apk_version, download_url, is_apk, mime_type_of, size_in_mib, stored_file_name,
};
use super::UploadError;
use crate::media::MediaDir;
use crate::storage::{Database, FileDescriptor, FileRecord, CURRENT_FILE_ID};

/// Capacity for exactly one package and its metadata.
///
/// Every upload runs as a [`SlotTransaction`] holding `lock`, so cleanup, write and
/// metadata replace of one upload never interleave with another's.
pub struct UploadSlot {
    db: Database,
    media: MediaDir,
    lock: Mutex<()>,
    max_upload_size: u64,
}

impl UploadSlot {
    pub fn new(db: Database, media: MediaDir, max_upload_size: u64) -> Self {
        Self {
            db,
            media,
            lock: Mutex::new(()),
            max_upload_size,
        }
    }

    pub fn media(&self) -> &MediaDir {
        &self.media
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// Wait for the slot, then wipe it.
    ///
    /// The wipe happens before anything about the incoming upload is known, so a
    /// rejected upload still leaves the slot empty.
    pub async fn begin(&self) -> SlotTransaction<'_> {
        let guard = self.lock.lock().await;
        self.clear().await;
        SlotTransaction {
            slot: self,
            _guard: guard,
        }
    }

    /// The published record, if any. Does not wait for an upload in progress.
    pub fn current(&self) -> Result<Option<FileRecord>, UploadError> {
        self.db.get_current().map_err(UploadError::StorageReadFailed)
    }

    async fn clear(&self) {
        match self.media.purge().await {
            Ok(stats) => {
                tracing::debug!(
                    removed = stats.removed,
                    failed = stats.failed,
                    "Purged media directory"
                );
            }
            Err(e) => {
                let err = UploadError::DirectoryCleanupFailed(e);
                tracing::error!(error = %err, "Eager cleanup could not purge media directory");
            }
        }

        // The directory may have been removed underneath us.
        if let Err(e) = self.media.ensure_exists().await {
            tracing::error!(error = %e, "Could not recreate media directory");
        }

        if let Err(e) = self.db.clear_current() {
            tracing::error!(error = %e, "Eager cleanup could not reset metadata");
        }
    }
}

/// One upload holding the slot. Dropping it releases the slot.
pub struct SlotTransaction<'a> {
    slot: &'a UploadSlot,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> SlotTransaction<'a> {
    pub fn max_upload_size(&self) -> u64 {
        self.slot.max_upload_size
    }

    /// Check the client's file name and open the stored file for writing.
    pub async fn stage(&self, original_name: &str) -> Result<StagedFile<'a>, UploadError> {
        if !is_apk(original_name) {
            tracing::debug!(file_name = %original_name, "Rejected non-APK upload");
            return Err(UploadError::InvalidFileType);
        }

        let stored_name = stored_file_name(original_name);
        let file = self.slot.media.create(&stored_name).await?;

        Ok(StagedFile {
            media: &self.slot.media,
            original_name: original_name.to_string(),
            stored_name,
            file,
            written: 0,
            limit: self.slot.max_upload_size,
        })
    }

    /// Publish a fully received file: build its descriptor and replace the metadata row.
    ///
    /// If the metadata write fails the file stays on disk without a record; the next
    /// upload's purge removes it.
    pub async fn commit(
        self,
        staged: StagedFile<'_>,
        base_url: &str,
    ) -> Result<FileDescriptor, UploadError> {
        let (original_name, stored_name, byte_size) = staged.finish().await?;

        let descriptor = FileDescriptor {
            file_url: download_url(base_url, &stored_name),
            mime_type: mime_type_of(&original_name).to_string(),
            file_size: size_in_mib(byte_size),
            apk_version: apk_version(&original_name),
            file_name: original_name,
        };

        let record = FileRecord {
            id: CURRENT_FILE_ID,
            stored_name,
            uploaded_at: Utc::now(),
            descriptor,
        };

        if let Err(e) = self.slot.db.replace_current(&record) {
            tracing::warn!(
                stored_name = %record.stored_name,
                error = %e,
                "Metadata write failed; stored file has no record until the next upload"
            );
            return Err(UploadError::StorageWriteFailed(e));
        }

        tracing::info!(
            file_name = %record.descriptor.file_name,
            stored_name = %record.stored_name,
            byte_size,
            apk_version = record.descriptor.apk_version.as_deref().unwrap_or("unknown"),
            "Published upload"
        );

        Ok(record.descriptor)
    }
}

/// An accepted file being streamed to disk.
pub struct StagedFile<'a> {
    media: &'a MediaDir,
    original_name: String,
    stored_name: String,
    file: File,
    written: u64,
    limit: u64,
}

impl StagedFile<'_> {
    pub fn stored_name(&self) -> &str {
        &self.stored_name
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, refusing anything that would take the file over the limit.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let next = self.written + chunk.len() as u64;
        if next > self.limit {
            return Err(UploadError::PayloadTooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    /// Give up on the file and delete what was written so far.
    pub async fn abort(self) {
        let StagedFile {
            media,
            stored_name,
            file,
            ..
        } = self;
        drop(file);
        if let Err(e) = media.remove(&stored_name).await {
            tracing::warn!(stored_name = %stored_name, error = %e, "Could not remove aborted upload");
        }
    }

    async fn finish(mut self) -> Result<(String, String, u64), UploadError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok((self.original_name, self.stored_name, self.written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(dir: &tempfile::TempDir, limit: u64) -> UploadSlot {
        let db = Database::open(dir.path().join("data")).unwrap();
        let media = MediaDir::new(dir.path().join("media")).unwrap();
        UploadSlot::new(db, media, limit)
    }

    async fn publish(slot: &UploadSlot, name: &str, data: &[u8]) -> FileDescriptor {
        let txn = slot.begin().await;
        let mut staged = txn.stage(name).await.unwrap();
        staged.write_chunk(data).await.unwrap();
        txn.commit(staged, "http://localhost:2000").await.unwrap()
    }

    #[tokio::test]
    async fn test_begin_wipes_slot_even_without_commit() {
        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 1024);
        publish(&slot, "old.apk", b"old").await;
        std::fs::write(slot.media().path().join("orphan.apk"), b"x").unwrap();

        drop(slot.begin().await);

        assert!(slot.media().entries().await.unwrap().is_empty());
        assert!(slot.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_publishes_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 4 * 1024 * 1024);

        let data = vec![7u8; 3 * 1024 * 1024];
        let descriptor = publish(&slot, "shop-store(4.2.0)-arm64.apk", &data).await;

        assert_eq!(descriptor.file_name, "shop-store(4.2.0)-arm64.apk");
        assert_eq!(descriptor.mime_type, "apk");
        assert_eq!(descriptor.file_size, 3.0);
        assert_eq!(descriptor.apk_version.as_deref(), Some("4.2.0"));
        assert!(descriptor.file_url.starts_with("http://localhost:2000/media/"));

        let record = slot.current().unwrap().unwrap();
        assert_eq!(record.descriptor, descriptor);
        assert_eq!(slot.media().entries().await.unwrap(), vec![record.stored_name]);
    }

    #[tokio::test]
    async fn test_write_past_limit_fails_and_abort_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 8);

        let txn = slot.begin().await;
        let mut staged = txn.stage("app.apk").await.unwrap();
        staged.write_chunk(b"12345").await.unwrap();
        let err = staged.write_chunk(b"6789").await.unwrap_err();
        assert!(matches!(err, UploadError::PayloadTooLarge { limit: 8 }));
        assert_eq!(staged.written(), 5);

        staged.abort().await;
        assert!(slot.media().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stage_rejects_non_apk_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 1024);

        let txn = slot.begin().await;
        assert!(matches!(
            txn.stage("notanapk.txt").await,
            Err(UploadError::InvalidFileType)
        ));
        assert!(slot.media().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_metadata_write_leaves_file_for_next_purge() {
        use crate::storage::UPLOADED_FILES;
        use redb::TableDefinition;

        // Same name, different key type: opening it as UPLOADED_FILES fails.
        const MISMATCHED: TableDefinition<&str, &[u8]> = TableDefinition::new("uploaded_files");

        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 1024);

        let txn = slot.begin().await;
        let mut staged = txn.stage("app-release(1.0.0).apk").await.unwrap();
        staged.write_chunk(b"package").await.unwrap();
        let stored_name = staged.stored_name().to_string();

        let write_txn = slot.db.begin_write().unwrap();
        write_txn.delete_table(UPLOADED_FILES).unwrap();
        write_txn.open_table(MISMATCHED).unwrap();
        write_txn.commit().unwrap();

        let err = txn
            .commit(staged, "http://localhost:2000")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::StorageWriteFailed(_)));
        assert_eq!(slot.media().entries().await.unwrap(), vec![stored_name]);

        let write_txn = slot.db.begin_write().unwrap();
        write_txn.delete_table(MISMATCHED).unwrap();
        write_txn.open_table(UPLOADED_FILES).unwrap();
        write_txn.commit().unwrap();
        assert!(slot.current().unwrap().is_none());

        drop(slot.begin().await);
        assert!(slot.media().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_transaction_waits_for_first() {
        let dir = tempfile::tempdir().unwrap();
        let slot = slot(&dir, 1024);

        let first = slot.begin().await;
        assert!(slot.lock.try_lock().is_err());
        drop(first);
        assert!(slot.lock.try_lock().is_ok());
    }
}
