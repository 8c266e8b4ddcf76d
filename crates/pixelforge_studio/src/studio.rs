use crate::assets::{AssetStore, EncodedAsset, StorageBackend};
use crate::prompts;
use bytes::Bytes;
use chrono::Utc;
use image::DynamicImage;
use pixelforge_core::prelude::*;
use pixelforge_imaging::{ImagingError, PixelateOptions};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Extensions accepted for uploaded images.
pub const UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Quantize provider output to the artifact's palette and block size.
    pub quantize_output: bool,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            quantize_output: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub settings: ArtSettings,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub data: Bytes,
    pub name: Option<String>,
    pub settings: ArtSettings,
    pub contrast: u8,
    pub sharpness: u8,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RevisionRequest {
    pub changes: SettingsPatch,
    pub prompt: Option<String>,
    /// When false only metadata and settings change; the image is kept.
    pub apply_changes_to_image: bool,
}

/// Result of [`Studio::revise`].
#[derive(Debug, Clone)]
pub struct Revision {
    pub artifact: Artifact,
    /// Classified intent, when the image was edited.
    pub intent: Option<Intent>,
    pub backend: Option<StorageBackend>,
}

/// The pixelforge workflows, wired to a set of backends.
#[derive(Clone)]
pub struct Studio<L, R, D, P>
where
    L: BlobStore,
    R: BlobStore,
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
    P: ImageProvider,
{
    assets: AssetStore<L, R>,
    repository: D,
    provider: P,
    palettes: PaletteRegistry,
    config: StudioConfig,
}

impl<L, R, D, P> Studio<L, R, D, P>
where
    L: BlobStore,
    R: BlobStore,
    D: ArtifactRepository + PreferencesRepository + PaletteRepository,
    P: ImageProvider,
{
    pub fn new(
        assets: AssetStore<L, R>,
        repository: D,
        provider: P,
        palettes: PaletteRegistry,
        config: StudioConfig,
    ) -> Self {
        Self {
            assets,
            repository,
            provider,
            palettes,
            config,
        }
    }

    pub fn assets(&self) -> &AssetStore<L, R> {
        &self.assets
    }

    /// The fixed palettes followed by the user-defined ones.
    async fn registry(&self) -> ForgeResult<PaletteRegistry> {
        let custom = self.repository.list_palettes().await?;
        Ok(self.palettes.extended(custom))
    }

    pub async fn palettes(&self) -> ForgeResult<Vec<Palette>> {
        Ok(self.registry().await?.list().to_vec())
    }

    pub async fn palette(&self, id: &str) -> ForgeResult<Palette> {
        self.registry()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("palette '{id}'")))
    }

    /// Stores a new user-defined palette. Ids already known are rejected.
    #[instrument(skip_all, fields(id = %palette.id))]
    pub async fn create_palette(&self, palette: Palette) -> ForgeResult<Palette> {
        palette.validate()?;
        if self.registry().await?.get(&palette.id).is_some() {
            return Err(ForgeError::Validation(format!(
                "palette '{}' already exists",
                palette.id
            )));
        }
        self.repository.put_palette(&palette).await?;
        info!("Palette created");
        Ok(palette)
    }

    /// Finds the user-defined palette `id`. Fixed palettes cannot be changed.
    async fn custom_palette(&self, id: &str) -> ForgeResult<Palette> {
        if self.palettes.get(id).is_some() {
            return Err(ForgeError::Validation(format!(
                "palette '{id}' is built in and cannot be changed"
            )));
        }
        self.repository
            .list_palettes()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ForgeError::NotFound(format!("palette '{id}'")))
    }

    pub async fn update_palette(&self, id: &str, patch: &PalettePatch) -> ForgeResult<Palette> {
        let mut palette = self.custom_palette(id).await?;
        palette.apply(patch);
        palette.validate()?;
        self.repository.put_palette(&palette).await?;
        Ok(palette)
    }

    /// Deletes a user-defined palette that no pixel art uses.
    #[instrument(skip(self))]
    pub async fn delete_palette(&self, id: &str) -> ForgeResult<()> {
        let palette = self.custom_palette(id).await?;
        let users = self
            .repository
            .list(&ArtifactQuery {
                palette_id: Some(palette.id.clone()),
                limit: 0,
                ..Default::default()
            })
            .await?
            .total;
        if users > 0 {
            return Err(ForgeError::Validation(format!(
                "palette '{id}' is used by {users} pixel art(s)"
            )));
        }
        self.repository.delete_palette(id).await?;
        info!("Palette deleted");
        Ok(())
    }

    /// Resolves the palette of `settings` after checking the block size.
    async fn resolve(&self, settings: &ArtSettings) -> ForgeResult<Palette> {
        if settings.pixel_size == 0 {
            return Err(ForgeError::Validation(
                "pixel size must be at least 1".into(),
            ));
        }
        Ok(self.registry().await?.resolve(&settings.palette_id)?.clone())
    }

    fn quantization(&self, settings: &ArtSettings, palette: &Palette) -> Option<(u32, Vec<Color>)> {
        self.config
            .quantize_output
            .then(|| (settings.pixel_size, palette.colors.clone()))
    }

    #[instrument(skip_all, fields(palette = %request.settings.palette_id))]
    pub async fn generate(&self, request: GenerateRequest) -> ForgeResult<Artifact> {
        let subject = request.prompt.trim();
        if subject.is_empty() {
            return Err(ForgeError::Validation("prompt must not be empty".into()));
        }

        let palette = self.resolve(&request.settings).await?;
        let full_prompt = prompts::generation(subject, &request.settings, &palette);
        let quantize = self.quantization(&request.settings, &palette);

        debug!("Requesting generation");
        let data = self.provider.generate(&full_prompt).await?;
        let encoded = run_blocking(move || render(&data, quantize))
            .await?
            .map_err(provider_output)?;
        let stored = self.assets.store(encoded).await?;

        let artifact = Artifact::new(NewArtifact {
            name: format!("Generated from: {}...", subject.chars().take(30).collect::<String>()),
            image: stored.image,
            width: stored.width,
            height: stored.height,
            settings: request.settings,
            tags: vec!["ai-generated".to_string(), "prompt".to_string()],
            prompt: Some(subject.to_string()),
        });
        self.repository.insert(&artifact).await?;

        info!(id = %artifact.id, backend = ?stored.backend, "Pixel art generated");
        Ok(artifact)
    }

    /// Turns an uploaded picture into a new artifact.
    ///
    /// With a prompt the provider transforms the picture; if it fails the
    /// local pipeline takes over.
    #[instrument(skip_all, fields(file = %request.file_name))]
    pub async fn process_upload(&self, request: UploadRequest) -> ForgeResult<Artifact> {
        let extension = Path::new(&request.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ForgeError::Validation(format!(
                "unsupported file format '{}', expected one of: {}",
                request.file_name,
                UPLOAD_EXTENSIONS.join(", ")
            )));
        }

        let palette = self.resolve(&request.settings).await?;
        let source = request.data.clone();
        let original = run_blocking(move || pixelforge_imaging::decode(&source)).await??;

        let instruction = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let mut encoded = None;
        if let Some(instruction) = instruction {
            let decoded = original.clone();
            let png = run_blocking(move || pixelforge_imaging::encode_png(&decoded)).await??;
            match self
                .transform(&request.settings, &palette, instruction, Bytes::from(png))
                .await
            {
                Ok(asset) => encoded = Some(asset),
                Err(e) => warn!("Provider transform failed, using local processing: {e}"),
            }
        }

        let encoded = match encoded {
            Some(asset) => asset,
            None => {
                let options = PixelateOptions {
                    block_size: request.settings.pixel_size,
                    contrast: request.contrast,
                    sharpness: request.sharpness,
                };
                let colors = palette.colors.clone();
                run_blocking(move || {
                    let pixelated = pixelforge_imaging::pixelate(original, options, &colors)?;
                    encode(&pixelated)
                })
                .await??
            }
        };
        let stored = self.assets.store(encoded).await?;

        let name = request
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                Path::new(&request.file_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let artifact = Artifact::new(NewArtifact {
            name,
            image: stored.image,
            width: stored.width,
            height: stored.height,
            settings: request.settings,
            tags: request.tags,
            prompt: instruction.map(str::to_string),
        });
        self.repository.insert(&artifact).await?;

        info!(id = %artifact.id, backend = ?stored.backend, "Uploaded image processed");
        Ok(artifact)
    }

    async fn transform(
        &self,
        settings: &ArtSettings,
        palette: &Palette,
        instruction: &str,
        png: Bytes,
    ) -> ForgeResult<EncodedAsset> {
        let prompt = prompts::transform(settings, palette, Some(instruction));
        let data = self.provider.edit(png, &prompt).await?;
        let quantize = self.quantization(settings, palette);
        run_blocking(move || render(&data, quantize))
            .await?
            .map_err(provider_output)
    }

    /// Applies `request` to artifact `id`.
    ///
    /// Nothing is written to the repository unless every step succeeds, so a
    /// failed revision leaves the stored artifact untouched.
    #[instrument(skip(self, request), fields(apply = request.apply_changes_to_image))]
    pub async fn revise(&self, id: &str, request: RevisionRequest) -> ForgeResult<Revision> {
        let current = self.repository.get(id).await?;

        if !request.apply_changes_to_image {
            let mut updated = current;
            updated.apply_patch(&request.changes);
            self.resolve(&updated.settings).await?;
            updated.updated_at = Utc::now();
            let artifact = self.repository.replace(updated).await?;
            debug!("Metadata updated");
            return Ok(Revision {
                artifact,
                intent: None,
                backend: None,
            });
        }

        let instruction = request
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ForgeError::Validation("a prompt is required to modify the image".into())
            })?
            .to_string();

        let settings = request.changes.apply_to(&current.settings);
        let palette = self.resolve(&settings).await?;
        let quantize = self.quantization(&settings, &palette);

        let image = self.assets.fetch(&current.image.image_url).await?;
        let description = self.provider.describe(image.clone()).await?;
        let intent = classify(&instruction);
        debug!(%intent, "Instruction classified");

        let prompt = prompts::edit(intent, &description, &instruction, &settings, &palette);
        let edited = self.provider.edit(image, &prompt).await?;

        let encoded = run_blocking(move || render(&edited, quantize))
            .await?
            .map_err(provider_output)?;
        let stored = self.assets.store(encoded).await?;

        let now = Utc::now();
        let mut updated = current.clone();
        let snapshot = current.snapshot(request.changes.clone(), now);
        updated.version_history = archive(std::mem::take(&mut updated.version_history), snapshot);
        updated.image = stored.image;
        updated.width = stored.width;
        updated.height = stored.height;
        updated.prompt = Some(instruction);
        updated.apply_patch(&request.changes);
        updated.updated_at = now;

        let artifact = self.repository.replace(updated).await?;
        info!(
            %intent,
            history = artifact.version_history.len(),
            backend = ?stored.backend,
            "Pixel art revised"
        );

        Ok(Revision {
            artifact,
            intent: Some(intent),
            backend: Some(stored.backend),
        })
    }

    pub async fn get(&self, id: &str) -> ForgeResult<Artifact> {
        self.repository.get(id).await
    }

    pub async fn list(&self, query: &ArtifactQuery) -> ForgeResult<ArtifactPage> {
        self.repository.list(query).await
    }

    pub async fn history(&self, id: &str) -> ForgeResult<Vec<VersionSnapshot>> {
        Ok(self.repository.get(id).await?.version_history)
    }

    /// Deletes the record and, best effort, its current image files.
    /// Images referenced only from the history are kept.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> ForgeResult<Artifact> {
        let artifact = self.repository.delete(id).await?;
        if let Err(e) = self.assets.delete(&artifact.image).await {
            warn!("Failed to delete assets of {id}: {e}");
        }
        info!("Pixel art deleted");
        Ok(artifact)
    }

    /// Preferences of `user_id`, created with defaults on first access.
    pub async fn preferences(&self, user_id: &str) -> ForgeResult<UserPreferences> {
        if let Some(preferences) = self.repository.get_preferences(user_id).await? {
            return Ok(preferences);
        }
        let preferences = UserPreferences::defaults_for(user_id);
        self.repository.put_preferences(&preferences).await?;
        Ok(preferences)
    }

    pub async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> ForgeResult<UserPreferences> {
        if let Some(palette) = &patch.default_palette {
            self.registry().await?.resolve(palette)?;
        }
        if patch.pixel_size == Some(0) {
            return Err(ForgeError::Validation(
                "pixel size must be at least 1".into(),
            ));
        }
        if patch.contrast.is_some_and(|v| v > 100) || patch.sharpness.is_some_and(|v| v > 100) {
            return Err(ForgeError::Validation(
                "contrast and sharpness range from 0 to 100".into(),
            ));
        }
        let mut preferences = self.preferences(user_id).await?;
        preferences.apply(patch);
        self.repository.put_preferences(&preferences).await?;
        Ok(preferences)
    }

    pub async fn reset_preferences(&self, user_id: &str) -> ForgeResult<UserPreferences> {
        let mut preferences = self.preferences(user_id).await?;
        preferences.reset();
        self.repository.put_preferences(&preferences).await?;
        Ok(preferences)
    }
}

async fn run_blocking<T, F>(work: F) -> ForgeResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ForgeError::Image(format!("image worker failed: {e}")))
}

fn encode(image: &DynamicImage) -> Result<EncodedAsset, ImagingError> {
    let png = pixelforge_imaging::encode_png(image)?;
    let thumbnail = pixelforge_imaging::encode_png(&pixelforge_imaging::thumbnail(image))?;
    Ok(EncodedAsset {
        png: Bytes::from(png),
        thumbnail: Bytes::from(thumbnail),
        width: image.width(),
        height: image.height(),
    })
}

/// Decodes provider output, quantizes it when asked to, and encodes it for
/// storage.
fn render(data: &[u8], quantize: Option<(u32, Vec<Color>)>) -> Result<EncodedAsset, ImagingError> {
    let image = pixelforge_imaging::decode(data)?;
    let image = match quantize {
        Some((block_size, colors)) => {
            DynamicImage::ImageRgba8(pixelforge_imaging::quantize(&image, block_size, &colors)?)
        }
        None => image,
    };
    encode(&image)
}

/// Undecodable provider output is the provider's fault, not the client's.
fn provider_output(err: ImagingError) -> ForgeError {
    match err {
        ImagingError::Decode(e) => ProviderError::Malformed(format!("undecodable image: {e}")).into(),
        other => other.into(),
    }
}
