use crate::ImagingError;
use image::{DynamicImage, Rgba, RgbaImage};
use pixelforge_core::palette::Color;

/// Pixels with alpha below this are treated as transparent.
pub const ALPHA_THRESHOLD: u8 = 128;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Maps `image` onto `palette` in square blocks of `block_size` pixels.
///
/// Blocks are anchored at the origin. Each block gets the palette color
/// nearest to the mean of its opaque pixels. When the image carries alpha
/// and less than half of a block is opaque, the block becomes transparent.
/// The result is a fixed point: quantizing it again yields the same image.
pub fn quantize(
    image: &DynamicImage,
    block_size: u32,
    palette: &[Color],
) -> Result<RgbaImage, ImagingError> {
    if palette.is_empty() {
        return Err(ImagingError::EmptyPalette);
    }

    let block = block_size.max(1);
    let has_alpha = image.color().has_alpha();
    let source = image.to_rgba8();
    let (width, height) = source.dimensions();
    let mut out = RgbaImage::new(width, height);

    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let bw = block.min(width - bx);
            let bh = block.min(height - by);

            let mut sum = [0u64; 3];
            let mut opaque = 0u64;
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let px = source.get_pixel(x, y);
                    if has_alpha && px[3] < ALPHA_THRESHOLD {
                        continue;
                    }
                    for (acc, channel) in sum.iter_mut().zip(px.0.iter()) {
                        *acc += u64::from(*channel);
                    }
                    opaque += 1;
                }
            }

            let total = u64::from(bw) * u64::from(bh);
            let fill = if opaque == 0 || opaque * 2 < total {
                TRANSPARENT
            } else {
                let mean = sum.map(|s| ((s + opaque / 2) / opaque) as u8);
                let [r, g, b] = nearest(palette, mean).0;
                Rgba([r, g, b, 255])
            };

            for y in by..by + bh {
                for x in bx..bx + bw {
                    out.put_pixel(x, y, fill);
                }
            }
        }
    }

    Ok(out)
}

/// Closest palette entry; ties go to the earliest entry.
fn nearest(palette: &[Color], rgb: [u8; 3]) -> Color {
    let mut best = palette[0];
    let mut best_distance = best.distance_sq(rgb);
    for color in &palette[1..] {
        let distance = color.distance_sq(rgb);
        if distance < best_distance {
            best = *color;
            best_distance = distance;
        }
    }
    best
}
