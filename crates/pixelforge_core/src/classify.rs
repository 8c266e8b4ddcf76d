//! Rule based classification of free-text modification requests.
//!
//! Categories are checked in a fixed priority order and the first one with a
//! trigger phrase contained in the (lowercased) instruction wins.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddText,
    RemoveElement,
    ColorChange,
    AddElement,
    GeneralModification,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddText => "add_text",
            Self::RemoveElement => "remove_element",
            Self::ColorChange => "color_change",
            Self::AddElement => "add_element",
            Self::GeneralModification => "general_modification",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ADD_TEXT: &[&str] = &[
    "título",
    "titulo",
    "texto",
    "letrero",
    "letras",
    "que diga",
    "que ponga",
    "escribe",
    "escribir",
    "title",
    "text",
    "caption",
    "label",
    "lettering",
    "that says",
    "write",
];

const REMOVE_ELEMENT: &[&str] = &[
    "quitar",
    "quita",
    "eliminar",
    "elimina",
    "borrar",
    "borra",
    "remove",
    "delete",
    "erase",
    "get rid of",
    "take out",
];

const COLOR_CHANGE: &[&str] = &[
    "color",
    "colour",
    "colores",
    "tono",
    "más oscuro",
    "mas oscuro",
    "más claro",
    "mas claro",
    "pintar",
    "pinta",
    "recolor",
    "hue",
    "tint",
    "darker",
    "brighter",
    "lighter",
];

const ADD_ELEMENT: &[&str] = &[
    "añadir",
    "añade",
    "anadir",
    "agregar",
    "agrega",
    "incluir",
    "incluye",
    "poner",
    "pon ",
    "add",
    "include",
    "insert",
    "put a",
    "place a",
];

/// Categories in priority order.
const RULES: &[(Intent, &[&str])] = &[
    (Intent::AddText, ADD_TEXT),
    (Intent::RemoveElement, REMOVE_ELEMENT),
    (Intent::ColorChange, COLOR_CHANGE),
    (Intent::AddElement, ADD_ELEMENT),
];

pub fn classify(instruction: &str) -> Intent {
    let text = instruction.to_lowercase();
    RULES
        .iter()
        .find(|(_, triggers)| triggers.iter().any(|t| text.contains(t)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::GeneralModification)
}
