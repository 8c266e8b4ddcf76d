//! In-memory stand-ins for every pixelforge port.
//!
//! Handles are cheap to clone and share their state, so a test can keep one
//! copy to inspect or to inject failures while the workflow under test owns
//! another.

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use pixelforge_core::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A `width` x `height` PNG filled with one color.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Bytes {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    Bytes::from(buffer.into_inner())
}

#[derive(Clone)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<HashMap<String, Bytes>>>,
    url_prefix: String,
    failing: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            blobs: Arc::default(),
            url_prefix: url_prefix.into(),
            failing: Arc::default(),
        }
    }

    /// While failing, every operation returns a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock(&self.blobs).keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Generic("memory storage is unavailable".into()));
        }
        Ok(())
    }
}

impl BlobStore for MemoryStorage {
    async fn write_blob(&self, key: &str, data: Bytes) -> Result<bool, StorageError> {
        self.check()?;
        let mut blobs = lock(&self.blobs);
        if blobs.contains_key(key) {
            return Ok(false);
        }
        blobs.insert(key.to_string(), data);
        Ok(true)
    }

    async fn read_file(&self, key: &str) -> Result<Bytes, StorageError> {
        self.check()?;
        lock(&self.blobs)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        Ok(lock(&self.blobs).contains_key(key))
    }

    async fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        lock(&self.blobs).remove(key);
        Ok(())
    }

    fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    artifacts: Arc<Mutex<HashMap<String, Artifact>>>,
    preferences: Arc<Mutex<HashMap<String, UserPreferences>>>,
    palettes: Arc<Mutex<HashMap<String, Palette>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactRepository for MemoryRepository {
    async fn get(&self, id: &str) -> ForgeResult<Artifact> {
        lock(&self.artifacts)
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(id.to_string()))
    }

    async fn insert(&self, artifact: &Artifact) -> ForgeResult<()> {
        let mut artifacts = lock(&self.artifacts);
        if artifacts.contains_key(&artifact.id) {
            return Err(ForgeError::Validation(format!(
                "pixel art {} already exists",
                artifact.id
            )));
        }
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(())
    }

    async fn replace(&self, mut artifact: Artifact) -> ForgeResult<Artifact> {
        let mut artifacts = lock(&self.artifacts);
        let stored = artifacts
            .get(&artifact.id)
            .ok_or_else(|| ForgeError::NotFound(artifact.id.clone()))?;
        if stored.revision != artifact.revision {
            return Err(ForgeError::Conflict {
                expected: artifact.revision,
                found: stored.revision,
                id: artifact.id,
            });
        }
        artifact.revision += 1;
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    async fn delete(&self, id: &str) -> ForgeResult<Artifact> {
        lock(&self.artifacts)
            .remove(id)
            .ok_or_else(|| ForgeError::NotFound(id.to_string()))
    }

    async fn list(&self, query: &ArtifactQuery) -> ForgeResult<ArtifactPage> {
        let artifacts: Vec<_> = lock(&self.artifacts).values().cloned().collect();
        Ok(query.select(artifacts))
    }
}

impl PreferencesRepository for MemoryRepository {
    async fn get_preferences(&self, user_id: &str) -> ForgeResult<Option<UserPreferences>> {
        Ok(lock(&self.preferences).get(user_id).cloned())
    }

    async fn put_preferences(&self, preferences: &UserPreferences) -> ForgeResult<()> {
        lock(&self.preferences).insert(preferences.user_id.clone(), preferences.clone());
        Ok(())
    }
}

impl PaletteRepository for MemoryRepository {
    async fn list_palettes(&self) -> ForgeResult<Vec<Palette>> {
        let mut palettes: Vec<_> = lock(&self.palettes).values().cloned().collect();
        palettes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(palettes)
    }

    async fn put_palette(&self, palette: &Palette) -> ForgeResult<()> {
        lock(&self.palettes).insert(palette.id.clone(), palette.clone());
        Ok(())
    }

    async fn delete_palette(&self, id: &str) -> ForgeResult<bool> {
        Ok(lock(&self.palettes).remove(id).is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCall {
    Generate,
    Describe,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub call: ProviderCall,
    pub prompt: Option<String>,
}

struct Script {
    image: Bytes,
    description: String,
    failing: HashSet<ProviderCall>,
    calls: Vec<RecordedCall>,
}

/// [`ImageProvider`] answering every call with canned data.
///
/// Every call is recorded, including the ones scripted to fail.
#[derive(Clone)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new(solid_png(64, 64, [139, 172, 15, 255]))
    }
}

impl ScriptedProvider {
    /// `image` is returned by both `generate` and `edit`.
    pub fn new(image: Bytes) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                image,
                description: "A small green pixel art landscape".to_string(),
                failing: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        lock(&self.script).description = description.into();
        self
    }

    pub fn set_image(&self, image: Bytes) {
        lock(&self.script).image = image;
    }

    pub fn fail(&self, call: ProviderCall) {
        lock(&self.script).failing.insert(call);
    }

    pub fn recover(&self, call: ProviderCall) {
        lock(&self.script).failing.remove(&call);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.script).calls.clone()
    }

    fn record(&self, call: ProviderCall, prompt: Option<&str>) -> Result<Reply, ProviderError> {
        let mut script = lock(&self.script);
        script.calls.push(RecordedCall {
            call,
            prompt: prompt.map(str::to_string),
        });
        if script.failing.contains(&call) {
            return Err(ProviderError::Api {
                status: 503,
                message: format!("scripted {call:?} failure"),
            });
        }
        Ok(Reply {
            image: script.image.clone(),
            description: script.description.clone(),
        })
    }
}

struct Reply {
    image: Bytes,
    description: String,
}

impl ImageProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str) -> Result<Bytes, ProviderError> {
        Ok(self.record(ProviderCall::Generate, Some(prompt))?.image)
    }

    async fn describe(&self, _image: Bytes) -> Result<String, ProviderError> {
        Ok(self.record(ProviderCall::Describe, None)?.description)
    }

    async fn edit(&self, _image: Bytes, prompt: &str) -> Result<Bytes, ProviderError> {
        Ok(self.record(ProviderCall::Edit, Some(prompt))?.image)
    }
}
