use crate::{atomic_write, safe_relative};
use bytes::Bytes;
use pixelforge_core::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

const ARTIFACTS: &str = "pixel_arts";
const PREFERENCES: &str = "preferences";
const PALETTES: &str = "palettes";

/// JSON document store on the local file system.
///
/// Writes are serialized through one lock so that the revision check in
/// [`ArtifactRepository::replace`] and the write that follows it cannot be
/// interleaved by another writer of the same process.
#[derive(Clone)]
pub struct FileSystemRepository {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileSystemRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            root: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn document_path(&self, collection: &str, id: &str) -> Result<PathBuf, StorageError> {
        let name = safe_relative(id)?;
        if name.components().count() != 1 {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(self
            .root
            .join(collection)
            .join(name)
            .with_extension("json"))
    }

    async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write_document<T: Serialize>(path: &Path, document: &T) -> Result<(), StorageError> {
        let data = Bytes::from(serde_json::to_vec_pretty(document)?);
        atomic_write(path, data).await
    }

    /// Every readable document of `collection`; unreadable ones are logged
    /// and skipped.
    async fn read_collection<T: DeserializeOwned>(&self, collection: &str) -> ForgeResult<Vec<T>> {
        let dir = self.root.join(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e).into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Io)? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_document::<T>(&path).await {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable document {}: {e}", path.display()),
            }
        }
        Ok(documents)
    }

    async fn load_artifact(&self, id: &str) -> ForgeResult<Artifact> {
        let path = self
            .document_path(ARTIFACTS, id)
            .map_err(|_| ForgeError::NotFound(id.to_string()))?;
        Self::read_document(&path)
            .await?
            .ok_or_else(|| ForgeError::NotFound(id.to_string()))
    }
}

impl ArtifactRepository for FileSystemRepository {
    async fn get(&self, id: &str) -> ForgeResult<Artifact> {
        self.load_artifact(id).await
    }

    #[instrument(skip(self, artifact), fields(id = %artifact.id))]
    async fn insert(&self, artifact: &Artifact) -> ForgeResult<()> {
        let path = self.document_path(ARTIFACTS, &artifact.id)?;
        let _guard = self.write_lock.lock().await;
        if path.exists() {
            return Err(ForgeError::Validation(format!(
                "pixel art {} already exists",
                artifact.id
            )));
        }
        Self::write_document(&path, artifact).await?;
        debug!("Artifact document created");
        Ok(())
    }

    #[instrument(skip(self, artifact), fields(id = %artifact.id, revision = artifact.revision))]
    async fn replace(&self, mut artifact: Artifact) -> ForgeResult<Artifact> {
        let path = self.document_path(ARTIFACTS, &artifact.id)?;
        let _guard = self.write_lock.lock().await;

        let stored: Artifact = Self::read_document(&path)
            .await?
            .ok_or_else(|| ForgeError::NotFound(artifact.id.clone()))?;
        if stored.revision != artifact.revision {
            warn!(found = stored.revision, "Rejected stale artifact write");
            return Err(ForgeError::Conflict {
                id: artifact.id,
                expected: artifact.revision,
                found: stored.revision,
            });
        }

        artifact.revision += 1;
        Self::write_document(&path, &artifact).await?;
        Ok(artifact)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> ForgeResult<Artifact> {
        let _guard = self.write_lock.lock().await;
        let artifact = self.load_artifact(id).await?;
        let path = self.document_path(ARTIFACTS, id)?;
        fs::remove_file(&path).await.map_err(StorageError::Io)?;
        Ok(artifact)
    }

    async fn list(&self, query: &ArtifactQuery) -> ForgeResult<ArtifactPage> {
        let artifacts = self.read_collection(ARTIFACTS).await?;
        Ok(query.select(artifacts))
    }
}

impl PreferencesRepository for FileSystemRepository {
    async fn get_preferences(&self, user_id: &str) -> ForgeResult<Option<UserPreferences>> {
        let path = self.document_path(PREFERENCES, user_id)?;
        Ok(Self::read_document(&path).await?)
    }

    async fn put_preferences(&self, preferences: &UserPreferences) -> ForgeResult<()> {
        let path = self.document_path(PREFERENCES, &preferences.user_id)?;
        let _guard = self.write_lock.lock().await;
        Self::write_document(&path, preferences).await?;
        Ok(())
    }
}

impl PaletteRepository for FileSystemRepository {
    async fn list_palettes(&self) -> ForgeResult<Vec<Palette>> {
        let mut palettes: Vec<Palette> = self.read_collection(PALETTES).await?;
        palettes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(palettes)
    }

    #[instrument(skip(self, palette), fields(id = %palette.id))]
    async fn put_palette(&self, palette: &Palette) -> ForgeResult<()> {
        let path = self.document_path(PALETTES, &palette.id)?;
        let _guard = self.write_lock.lock().await;
        Self::write_document(&path, palette).await?;
        debug!("Palette document written");
        Ok(())
    }

    async fn delete_palette(&self, id: &str) -> ForgeResult<bool> {
        let path = self.document_path(PALETTES, id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e).into()),
        }
    }
}
