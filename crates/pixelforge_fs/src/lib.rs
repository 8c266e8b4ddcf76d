//! # Pixelforge FileSystem Backends
//!
//! Local filesystem implementations of the pixelforge storage ports:
//!
//! * [`FileSystemStorage`] implements [`BlobStore`], storing images and
//!   thumbnails as plain files that the server exposes under a public URL
//!   prefix.
//! * [`FileSystemRepository`] implements [`ArtifactRepository`],
//!   [`PreferencesRepository`] and [`PaletteRepository`], keeping one JSON
//!   document per record.
//!
//! ## Features
//!
//! * **Atomic Writes**: Uses temporary files and rename operations so a
//!   reader never sees a partially written image or document.
//!
//! ## Usage
//!
//! ```no_run
//! use pixelforge_fs::{FileSystemRepository, FileSystemStorage};
//!
//! let storage = FileSystemStorage::new("./pixelforge_data/assets", "http://localhost:8000/images/");
//! let repository = FileSystemRepository::new("./pixelforge_data/db");
//! ```

use pixelforge_core::prelude::*;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

mod repository;

pub use repository::FileSystemRepository;

pub(crate) async fn atomic_write(path: &Path, data: Bytes) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
    }

    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, data).await.map_err(StorageError::Io)?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(StorageError::Io)?;

    Ok(())
}

/// Rejects keys that would escape the storage root.
pub(crate) fn safe_relative(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let clean = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if clean {
        Ok(path)
    } else {
        Err(StorageError::NotFound(key.to_string()))
    }
}

#[derive(Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    url_prefix: String,
}

impl FileSystemStorage {
    /// `url_prefix` is prepended to keys to form public URLs, e.g.
    /// `http://localhost:8000/images/`.
    pub fn new(path: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: path.into(),
            url_prefix: url_prefix.into(),
        }
    }

    fn get_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(safe_relative(key)?))
    }
}

impl BlobStore for FileSystemStorage {
    async fn write_blob(&self, key: &str, data: Bytes) -> Result<bool, StorageError> {
        let path = self.get_path(key)?;
        if path.exists() {
            return Ok(false);
        }
        atomic_write(&path, data).await?;
        Ok(true)
    }

    async fn read_file(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.get_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string_lossy().to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get_path(key)?.exists())
    }

    async fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        let path = self.get_path(key)?;
        if path.exists() {
            fs::remove_file(&path).await.map_err(StorageError::Io)?;
        }
        Ok(())
    }

    fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}
