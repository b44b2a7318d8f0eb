use std::path::{Path, PathBuf};

use tokio::fs::File;

use super::MediaError;

/// The single-slot media directory.
///
/// Holds the currently published package and nothing else; every upload purges it
/// before writing. Nothing here enforces the one-file limit on its own.
#[derive(Debug, Clone)]
pub struct MediaDir {
    base_path: PathBuf,
}

/// Outcome of a purge. Failed entries are logged, not returned as errors.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub removed: u64,
    pub failed: u64,
}

impl MediaDir {
    /// Create the directory (and parents) if needed.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Idempotent; a no-op when the directory already exists.
    pub async fn ensure_exists(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Delete every entry directly inside the directory. Non-recursive.
    ///
    /// Fails only when the directory itself can't be read; a single entry that
    /// refuses to go is logged and counted in `failed`.
    pub async fn purge(&self) -> Result<PurgeStats, MediaError> {
        let mut entries = tokio::fs::read_dir(&self.base_path)
            .await
            .map_err(|source| self.unreadable(source))?;

        let mut stats = PurgeStats::default();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => return Err(self.unreadable(source)),
            };

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => stats.removed += 1,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Could not delete file");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Names of the entries directly inside the directory, sorted.
    pub async fn entries(&self) -> Result<Vec<String>, MediaError> {
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Create (or truncate) `name` for writing.
    pub async fn create(&self, name: &str) -> Result<File, MediaError> {
        let path = self.entry_path(name)?;
        Ok(File::create(path).await?)
    }

    /// Open `name` for reading, together with its length in bytes.
    pub async fn open(&self, name: &str) -> Result<(File, u64), MediaError> {
        let path = self.entry_path(name)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(MediaError::NotFound(name.to_string()));
        }
        Ok((file, metadata.len()))
    }

    /// Remove `name` if present.
    pub async fn remove(&self, name: &str) -> Result<(), MediaError> {
        let path = self.entry_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn unreadable(&self, source: std::io::Error) -> MediaError {
        MediaError::Unreadable {
            path: self.base_path.display().to_string(),
            source,
        }
    }

    /// Resolve a bare entry name. Anything that could escape the directory is treated as missing.
    fn entry_path(&self, name: &str) -> Result<PathBuf, MediaError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(MediaError::NotFound(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }
}
