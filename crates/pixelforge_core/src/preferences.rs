use crate::model::{AnimationType, ArtSettings, BackgroundType, PixelArtStyle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER: &str = "default";

/// Per-user defaults for new creations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: String,
    pub pixel_size: u32,
    pub default_style: PixelArtStyle,
    pub default_palette: String,
    pub contrast: u8,
    pub sharpness: u8,
    pub default_background: BackgroundType,
    pub default_animation_type: AnimationType,
    pub theme: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            pixel_size: 8,
            default_style: PixelArtStyle::Retro,
            default_palette: "gameboy".to_string(),
            contrast: 50,
            sharpness: 70,
            default_background: BackgroundType::Transparent,
            default_animation_type: AnimationType::None,
            theme: "dark".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Settings a new creation starts from when the request leaves them out.
    pub fn art_settings(&self) -> ArtSettings {
        ArtSettings {
            pixel_size: self.pixel_size,
            style: self.default_style,
            palette_id: self.default_palette.clone(),
            background_type: self.default_background,
            animation_type: self.default_animation_type,
        }
    }

    /// Back to defaults, keeping identity and creation time.
    pub fn reset(&mut self) {
        let created_at = self.created_at;
        *self = Self::defaults_for(std::mem::take(&mut self.user_id));
        self.created_at = created_at;
    }

    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(v) = patch.pixel_size {
            self.pixel_size = v;
        }
        if let Some(v) = patch.default_style {
            self.default_style = v;
        }
        if let Some(v) = &patch.default_palette {
            self.default_palette = v.clone();
        }
        if let Some(v) = patch.contrast {
            self.contrast = v;
        }
        if let Some(v) = patch.sharpness {
            self.sharpness = v;
        }
        if let Some(v) = patch.default_background {
            self.default_background = v;
        }
        if let Some(v) = patch.default_animation_type {
            self.default_animation_type = v;
        }
        if let Some(v) = &patch.theme {
            self.theme = v.clone();
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default)]
    pub pixel_size: Option<u32>,
    #[serde(default)]
    pub default_style: Option<PixelArtStyle>,
    #[serde(default)]
    pub default_palette: Option<String>,
    #[serde(default)]
    pub contrast: Option<u8>,
    #[serde(default)]
    pub sharpness: Option<u8>,
    #[serde(default)]
    pub default_background: Option<BackgroundType>,
    #[serde(default)]
    pub default_animation_type: Option<AnimationType>,
    #[serde(default)]
    pub theme: Option<String>,
}
