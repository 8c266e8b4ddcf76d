use bytes::Bytes;
use pixelforge_core::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Which backend ended up holding a stored asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Remote,
    /// A remote backend is configured but the write failed over to local.
    LocalFallback,
    Local,
}

/// An image ready to be stored: PNG bytes of the image and its thumbnail.
#[derive(Debug, Clone)]
pub struct EncodedAsset {
    pub png: Bytes,
    pub thumbnail: Bytes,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub image: ImageRef,
    pub width: u32,
    pub height: u32,
    pub backend: StorageBackend,
}

/// Fresh blob keys for one stored asset.
///
/// Keys start with a digest of the image but are unique per call, so
/// deleting one artifact's files never touches another artifact or an
/// earlier version that rendered the same pixels.
pub fn asset_keys(png: &[u8]) -> (String, String) {
    let mut hasher = Sha256::new();
    hasher.update(png);
    let digest = hex::encode(&hasher.finalize()[..8]);
    let name = format!("{digest}-{}", Uuid::new_v4().simple());
    (
        format!("images/{name}.png"),
        format!("thumbnails/{name}.png"),
    )
}

/// Local blob store with an optional remote one in front of it.
///
/// Writes go to the remote store when there is one and degrade to the local
/// store when it fails. Reads and deletes go to whichever store handed out
/// the URL.
#[derive(Clone)]
pub struct AssetStore<L: BlobStore, R: BlobStore> {
    local: L,
    remote: Option<R>,
}

impl<L: BlobStore> AssetStore<L, L> {
    pub fn local_only(local: L) -> Self {
        Self {
            local,
            remote: None,
        }
    }
}

impl<L: BlobStore, R: BlobStore> AssetStore<L, R> {
    pub fn new(local: L, remote: Option<R>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    #[instrument(skip_all, fields(width = asset.width, height = asset.height))]
    pub async fn store(&self, asset: EncodedAsset) -> ForgeResult<StoredAsset> {
        let (image_key, thumbnail_key) = asset_keys(&asset.png);

        let backend = match &self.remote {
            Some(remote) => {
                match write_pair(remote, &image_key, &thumbnail_key, &asset).await {
                    Ok(image) => {
                        debug!(url = %image.image_url, "Asset stored remotely");
                        return Ok(StoredAsset {
                            image,
                            width: asset.width,
                            height: asset.height,
                            backend: StorageBackend::Remote,
                        });
                    }
                    Err(e) => {
                        warn!("Remote asset storage failed, falling back to local: {e}");
                        StorageBackend::LocalFallback
                    }
                }
            }
            None => StorageBackend::Local,
        };

        let image = write_pair(&self.local, &image_key, &thumbnail_key, &asset)
            .await
            .inspect_err(|e| error!("Local asset storage failed: {e}"))?;
        debug!(url = %image.image_url, ?backend, "Asset stored locally");

        Ok(StoredAsset {
            image,
            width: asset.width,
            height: asset.height,
            backend,
        })
    }

    /// Reads the bytes behind `url` from whichever store serves it.
    pub async fn fetch(&self, url: &str) -> ForgeResult<Bytes> {
        if let Some(remote) = &self.remote
            && let Some(key) = remote.key_for_url(url)
        {
            return Ok(remote.read_file(key).await?);
        }
        if let Some(key) = self.local.key_for_url(url) {
            return Ok(self.local.read_file(key).await?);
        }
        Err(ForgeError::Validation(format!(
            "image URL '{url}' is not served by any configured store"
        )))
    }

    /// Deletes both files of `image`. URLs no store owns are skipped.
    pub async fn delete(&self, image: &ImageRef) -> ForgeResult<()> {
        for url in [&image.image_url, &image.thumbnail_url] {
            if let Some(remote) = &self.remote
                && let Some(key) = remote.key_for_url(url)
            {
                remote.delete_file(key).await?;
            } else if let Some(key) = self.local.key_for_url(url) {
                self.local.delete_file(key).await?;
            } else {
                debug!(url, "No store owns this URL, skipping delete");
            }
        }
        Ok(())
    }
}

async fn write_pair<S: BlobStore>(
    store: &S,
    image_key: &str,
    thumbnail_key: &str,
    asset: &EncodedAsset,
) -> Result<ImageRef, StorageError> {
    store.write_blob(image_key, asset.png.clone()).await?;
    store
        .write_blob(thumbnail_key, asset.thumbnail.clone())
        .await?;
    Ok(ImageRef {
        image_url: store.public_url(image_key),
        thumbnail_url: store.public_url(thumbnail_key),
    })
}
