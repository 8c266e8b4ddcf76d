use crate::error::ForgeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque RGB color, written as `#rrggbb` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Squared euclidean distance over the RGB channels.
    pub fn distance_sq(&self, other: [u8; 3]) -> u32 {
        self.0
            .iter()
            .zip(other.iter())
            .map(|(a, b)| {
                let d = i32::from(*a) - i32::from(*b);
                (d * d) as u32
            })
            .sum()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

impl FromStr for Color {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ForgeError::InvalidPalette(format!("bad color '{s}'")));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ForgeError::InvalidPalette(format!("bad color '{s}'")))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub id: String,
    pub name: String,
    pub colors: Vec<Color>,
}

impl Palette {
    /// Checks a palette supplied by a user before it is stored.
    pub fn validate(&self) -> Result<(), ForgeError> {
        let id_ok = !self.id.is_empty()
            && self.id.len() <= 64
            && self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !id_ok {
            return Err(ForgeError::Validation(format!(
                "palette id '{}' must be 1 to 64 letters, digits, '-' or '_'",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ForgeError::Validation("palette name must not be empty".into()));
        }
        if self.colors.is_empty() {
            return Err(ForgeError::InvalidPalette(format!(
                "palette '{}' has no colors",
                self.id
            )));
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: &PalettePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(colors) = &patch.colors {
            self.colors = colors.clone();
        }
    }

    /// Colors as space separated hex codes, the form image models are given.
    pub fn hex_codes(&self) -> String {
        self.colors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Partial update of a user-defined palette. The id never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PalettePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Color>>,
}

const BUILTIN: &[(&str, &str, &[&str])] = &[
    (
        "gameboy",
        "GameBoy",
        &["#0f380f", "#306230", "#8bac0f", "#9bbc0f"],
    ),
    (
        "nes",
        "NES",
        &["#000000", "#fcfcfc", "#f8f8f8", "#bcbcbc", "#7c7c7c", "#a4000c"],
    ),
    (
        "cga",
        "CGA",
        &["#000000", "#555555", "#aaaaaa", "#ffffff", "#0000aa", "#5555ff"],
    ),
    (
        "pico8",
        "PICO-8",
        &["#000000", "#1d2b53", "#7e2553", "#008751", "#ab5236", "#5f574f"],
    ),
    (
        "moody",
        "Moody Purple",
        &["#5e315b", "#8c3f5d", "#ba6156", "#f2a65a"],
    ),
];

/// Palettes known to the service: a fixed set, optionally extended with
/// user-defined ones.
#[derive(Debug, Clone)]
pub struct PaletteRegistry {
    palettes: Vec<Palette>,
}

impl Default for PaletteRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PaletteRegistry {
    pub fn new(palettes: Vec<Palette>) -> Self {
        Self { palettes }
    }

    pub fn builtin() -> Self {
        let palettes = BUILTIN
            .iter()
            .map(|(id, name, colors)| Palette {
                id: id.to_string(),
                name: name.to_string(),
                colors: colors
                    .iter()
                    .filter_map(|hex| hex.parse().ok())
                    .collect(),
            })
            .collect();
        Self { palettes }
    }

    pub fn get(&self, id: &str) -> Option<&Palette> {
        self.palettes.iter().find(|p| p.id == id)
    }

    /// Like [`Self::get`], but unknown or empty palettes are an error.
    pub fn resolve(&self, id: &str) -> Result<&Palette, ForgeError> {
        match self.get(id) {
            Some(palette) if !palette.colors.is_empty() => Ok(palette),
            Some(_) => Err(ForgeError::InvalidPalette(format!(
                "palette '{id}' has no colors"
            ))),
            None => Err(ForgeError::InvalidPalette(format!(
                "palette '{id}' does not exist"
            ))),
        }
    }

    pub fn list(&self) -> &[Palette] {
        &self.palettes
    }

    /// This registry followed by `custom`. Custom palettes never shadow an
    /// existing id.
    pub fn extended(&self, custom: Vec<Palette>) -> Self {
        let mut palettes = self.palettes.clone();
        for palette in custom {
            if self.get(&palette.id).is_none() {
                palettes.push(palette);
            }
        }
        Self { palettes }
    }
}
