//! Prompt construction for the image provider.

use pixelforge_core::prelude::*;

/// Image models tend to draw a swatch strip when told about a "palette".
fn scrub(prompt: String) -> String {
    prompt
        .replace("palette", "colors")
        .replace("swatch", "colors")
        .replace("color scheme display", "")
}

/// Text to image prompt carrying every rendering setting.
pub fn generation(subject: &str, settings: &ArtSettings, palette: &Palette) -> String {
    let size = settings.pixel_size;
    scrub(format!(
        "Create a {} pixel art character of a {}, with {size}x{size} pixel blocks, on a {}. \
         Color scheme: {}. Character only, no text, no UI elements.",
        settings.style.description(),
        subject.trim(),
        settings.background_type.description(),
        palette.hex_codes(),
    ))
}

/// Prompt turning an uploaded picture into pixel art.
pub fn transform(settings: &ArtSettings, palette: &Palette, instruction: Option<&str>) -> String {
    let size = settings.pixel_size;
    let mut prompt = format!(
        "Transform this image into a {} pixel art with {size}x{size} pixel blocks. \
         Colors to use: {}. Faithfully preserve the original subject but in pixel art style.",
        settings.style.description(),
        palette.hex_codes(),
    );
    // The user's own words are passed through untouched.
    if let Some(instruction) = instruction.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!(" Additionally: {instruction}."));
    }
    prompt.push_str(" No text, no UI elements.");
    prompt
}

fn guidance(intent: Intent) -> &'static str {
    match intent {
        Intent::AddText => {
            "Render the requested text exactly as written, letter by letter, in a legible \
             pixel font that matches the art. Place it where it does not cover the main subject."
        }
        Intent::RemoveElement => {
            "Remove only the named element and fill the area it occupied so that it blends \
             with the surrounding background."
        }
        Intent::ColorChange => {
            "Change only the colors of the named elements. Every shape, outline and position \
             stays exactly as it is."
        }
        Intent::AddElement => {
            "Add the new element at a sensible scale, drawn in the same pixel style, without \
             moving or resizing anything that is already there."
        }
        Intent::GeneralModification => {
            "Apply the modification with the smallest visual change that satisfies it."
        }
    }
}

/// Edit prompt for one revision: what the image shows, what must change and
/// what must stay. The description and the instruction are quoted verbatim.
pub fn edit(
    intent: Intent,
    description: &str,
    instruction: &str,
    settings: &ArtSettings,
    palette: &Palette,
) -> String {
    let size = settings.pixel_size;
    format!(
        "This is an existing pixel art image: {}\n\
         Requested change ({intent}): {}\n\
         {}\n\
         Keep every other element, its position, its size and its colors identical to the \
         original. Keep the {} pixel art style with {size}x{size} pixel blocks and use only \
         these colors: {}. The requested change must be the only difference.",
        description.trim(),
        instruction.trim(),
        guidance(intent),
        settings.style.description(),
        palette.hex_codes(),
    )
}
