//! # Pixelforge Imaging
//!
//! Local image processing for pixelforge: decoding and PNG encoding,
//! contrast and sharpness adjustments, palette quantization and thumbnails.
//!
//! Everything here is synchronous and CPU bound; async callers should run it
//! on a blocking thread.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use pixelforge_core::error::ForgeError;
use pixelforge_core::palette::Color;
use std::io::Cursor;
use thiserror::Error;

mod quantize;

pub use quantize::{ALPHA_THRESHOLD, quantize};

/// Longest edge of generated thumbnails.
pub const THUMBNAIL_SIZE: u32 = 150;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("Palette has no colors")]
    EmptyPalette,

    #[error("Image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Image could not be encoded: {0}")]
    Encode(#[source] image::ImageError),
}

impl From<ImagingError> for ForgeError {
    fn from(err: ImagingError) -> Self {
        let message = err.to_string();
        match err {
            ImagingError::EmptyPalette => ForgeError::InvalidPalette(message),
            ImagingError::Decode(_) | ImagingError::Encode(_) => ForgeError::Image(message),
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
    image::load_from_memory(bytes).map_err(ImagingError::Decode)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ImagingError::Encode)?;
    Ok(buffer.into_inner())
}

/// Contrast and sharpness on a 0..=100 scale; 50 leaves the image untouched.
pub fn adjust(image: DynamicImage, contrast: u8, sharpness: u8) -> DynamicImage {
    let contrast = f32::from(contrast.min(100)) - 50.0;
    let sharpness = f32::from(sharpness.min(100)) - 50.0;

    let image = if contrast != 0.0 {
        image.adjust_contrast(contrast * 2.0)
    } else {
        image
    };

    if sharpness > 0.0 {
        image.unsharpen(sharpness / 25.0, 1)
    } else if sharpness < 0.0 {
        image.blur(-sharpness / 25.0)
    } else {
        image
    }
}

/// Nearest-neighbour downscale so block edges stay crisp.
pub fn thumbnail(image: &DynamicImage) -> DynamicImage {
    if image.width() <= THUMBNAIL_SIZE && image.height() <= THUMBNAIL_SIZE {
        return image.clone();
    }
    image.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Nearest)
}

/// Settings of the local "photo to pixel art" pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PixelateOptions {
    pub block_size: u32,
    pub contrast: u8,
    pub sharpness: u8,
}

/// Adjusts then quantizes `image`.
pub fn pixelate(
    image: DynamicImage,
    options: PixelateOptions,
    palette: &[Color],
) -> Result<DynamicImage, ImagingError> {
    let adjusted = adjust(image, options.contrast, options.sharpness);
    quantize(&adjusted, options.block_size, palette).map(DynamicImage::ImageRgba8)
}
