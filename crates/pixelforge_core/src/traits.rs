use crate::error::*;
use crate::model::{Artifact, ArtifactPage, ArtifactQuery};
use crate::palette::Palette;
use crate::preferences::UserPreferences;

use bytes::Bytes;

/// A place binary assets can be written to and served from.
pub trait BlobStore: Send + Sync + 'static + Clone {
    /// Writes `data` under `key`. Returns `false` if the key already existed.
    fn write_blob(
        &self,
        key: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
    fn read_file(&self, key: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send;
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
    fn delete_file(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Prefix every public URL of this store starts with.
    fn url_prefix(&self) -> &str;

    fn public_url(&self, key: &str) -> String {
        format!("{}{key}", self.url_prefix())
    }

    /// The key behind `url`, if the URL was handed out by this store.
    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.url_prefix())
            .filter(|key| !key.is_empty())
    }
}

/// Persistence of artifact documents.
///
/// Each call is atomic at the granularity of one document.
pub trait ArtifactRepository: Send + Sync + 'static + Clone {
    /// Fails with [`ForgeError::NotFound`] for unknown ids.
    fn get(&self, id: &str) -> impl Future<Output = ForgeResult<Artifact>> + Send;

    fn insert(&self, artifact: &Artifact) -> impl Future<Output = ForgeResult<()>> + Send;

    /// Compare-and-swap on [`Artifact::revision`]: the stored document must
    /// still carry the revision of `artifact`. Returns the stored document,
    /// whose revision has been bumped.
    fn replace(&self, artifact: Artifact) -> impl Future<Output = ForgeResult<Artifact>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = ForgeResult<Artifact>> + Send;

    fn list(&self, query: &ArtifactQuery) -> impl Future<Output = ForgeResult<ArtifactPage>> + Send;
}

pub trait PreferencesRepository: Send + Sync + 'static + Clone {
    fn get_preferences(
        &self,
        user_id: &str,
    ) -> impl Future<Output = ForgeResult<Option<UserPreferences>>> + Send;

    fn put_preferences(
        &self,
        preferences: &UserPreferences,
    ) -> impl Future<Output = ForgeResult<()>> + Send;
}

/// Persistence of user-defined palettes. Builtin palettes are never stored.
pub trait PaletteRepository: Send + Sync + 'static + Clone {
    fn list_palettes(&self) -> impl Future<Output = ForgeResult<Vec<Palette>>> + Send;

    /// Creates or overwrites the palette with the same id.
    fn put_palette(&self, palette: &Palette) -> impl Future<Output = ForgeResult<()>> + Send;

    /// Returns `false` if there was no such palette.
    fn delete_palette(&self, id: &str) -> impl Future<Output = ForgeResult<bool>> + Send;
}

/// An external image model able to draw, look at and edit images.
pub trait ImageProvider: Send + Sync + 'static + Clone {
    /// Text to image. Returns encoded image bytes.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<Bytes, ProviderError>> + Send;

    /// Natural language description of `image`.
    fn describe(&self, image: Bytes) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Edits `image` following `prompt`. Returns encoded image bytes.
    fn edit(
        &self,
        image: Bytes,
        prompt: &str,
    ) -> impl Future<Output = Result<Bytes, ProviderError>> + Send;
}
