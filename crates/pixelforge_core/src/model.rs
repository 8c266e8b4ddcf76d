use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelArtStyle {
    #[default]
    Retro,
    Modern,
    Minimalist,
    Dithered,
    Isometric,
}

impl PixelArtStyle {
    /// Wording used when describing the style to an image model.
    pub fn description(self) -> &'static str {
        match self {
            Self::Retro => "retro 8-bit NES-style",
            Self::Modern => "16-bit SNES-style",
            Self::Minimalist => "minimalist",
            Self::Dithered => "dithered",
            Self::Isometric => "isometric",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retro => "retro",
            Self::Modern => "modern",
            Self::Minimalist => "minimalist",
            Self::Dithered => "dithered",
            Self::Isometric => "isometric",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    #[default]
    Transparent,
    Solid,
    Gradient,
    Pattern,
}

impl BackgroundType {
    pub fn description(self) -> &'static str {
        match self {
            Self::Transparent => "transparent background",
            Self::Solid => "simple solid color background",
            Self::Gradient => "subtle gradient background",
            Self::Pattern => "simple pattern background",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationType {
    #[default]
    None,
    Breathing,
    Flickering,
    Floating,
}

/// Rendering settings of one artifact version.
///
/// Replaced wholesale whenever a new version is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtSettings {
    pub pixel_size: u32,
    pub style: PixelArtStyle,
    pub palette_id: String,
    pub background_type: BackgroundType,
    pub animation_type: AnimationType,
}

impl Default for ArtSettings {
    fn default() -> Self {
        Self {
            pixel_size: 8,
            style: PixelArtStyle::default(),
            palette_id: "gameboy".to_string(),
            background_type: BackgroundType::default(),
            animation_type: AnimationType::default(),
        }
    }
}

/// A partial update to an artifact's metadata and settings.
///
/// Also recorded verbatim as the `changes` of a [`VersionSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<PixelArtStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_type: Option<BackgroundType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_type: Option<AnimationType>,
}

impl SettingsPatch {
    /// The settings that result from applying this patch on top of `base`.
    pub fn apply_to(&self, base: &ArtSettings) -> ArtSettings {
        ArtSettings {
            pixel_size: self.pixel_size.unwrap_or(base.pixel_size),
            style: self.style.unwrap_or(base.style),
            palette_id: self
                .palette_id
                .clone()
                .unwrap_or_else(|| base.palette_id.clone()),
            background_type: self.background_type.unwrap_or(base.background_type),
            animation_type: self.animation_type.unwrap_or(base.animation_type),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Addressable location of an image and its thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub image_url: String,
    pub thumbnail_url: String,
}

/// Immutable record of a prior artifact state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub image: ImageRef,
    #[serde(default)]
    pub prompt: Option<String>,
    /// The patch applied going into the following version.
    #[serde(default)]
    pub changes: SettingsPatch,
}

/// A stored pixel art creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub image: ImageRef,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub settings: ArtSettings,
    pub is_animated: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Oldest first, bounded by [`crate::history::HISTORY_LIMIT`].
    #[serde(default)]
    pub version_history: Vec<VersionSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the repository on replace.
    #[serde(default)]
    pub revision: u64,
}

/// Everything needed to create an [`Artifact`].
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub name: String,
    pub image: ImageRef,
    pub width: u32,
    pub height: u32,
    pub settings: ArtSettings,
    pub tags: Vec<String>,
    pub prompt: Option<String>,
}

impl Artifact {
    pub fn new(new: NewArtifact) -> Self {
        let now = Utc::now();
        let is_animated = new.settings.animation_type != AnimationType::None;

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            image: new.image,
            width: new.width,
            height: new.height,
            settings: new.settings,
            is_animated,
            tags: new.tags,
            description: None,
            prompt: new.prompt,
            version_history: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Snapshot of the current state, to be archived before it is replaced.
    pub fn snapshot(&self, changes: SettingsPatch, timestamp: DateTime<Utc>) -> VersionSnapshot {
        VersionSnapshot {
            timestamp,
            image: self.image.clone(),
            prompt: self.prompt.clone(),
            changes,
        }
    }

    pub fn set_settings(&mut self, settings: ArtSettings) {
        self.is_animated = settings.animation_type != AnimationType::None;
        self.settings = settings;
    }

    /// Applies the metadata part and the settings part of `patch`.
    pub fn apply_patch(&mut self, patch: &SettingsPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        let settings = patch.apply_to(&self.settings);
        self.set_settings(settings);
    }
}

/// Filters and paging for artifact listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub style: Option<PixelArtStyle>,
    #[serde(default)]
    pub palette_id: Option<String>,
    /// Case-insensitive substring of the name.
    #[serde(default)]
    pub q: Option<String>,
}

fn default_limit() -> usize {
    100
}

impl Default for ArtifactQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            tag: None,
            style: None,
            palette_id: None,
            q: None,
        }
    }
}

impl ArtifactQuery {
    pub fn matches(&self, artifact: &Artifact) -> bool {
        if let Some(tag) = &self.tag
            && !artifact.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        if let Some(style) = self.style
            && artifact.settings.style != style
        {
            return false;
        }
        if let Some(palette_id) = &self.palette_id
            && &artifact.settings.palette_id != palette_id
        {
            return false;
        }
        if let Some(q) = &self.q
            && !artifact.name.to_lowercase().contains(&q.to_lowercase())
        {
            return false;
        }
        true
    }

    /// Filters, orders newest first and pages `artifacts`.
    pub fn select(&self, artifacts: impl IntoIterator<Item = Artifact>) -> ArtifactPage {
        let mut matching: Vec<Artifact> = artifacts
            .into_iter()
            .filter(|a| self.matches(a))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(self.skip)
            .take(self.limit)
            .collect();

        ArtifactPage { items, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPage {
    pub items: Vec<Artifact>,
    pub total: usize,
}
