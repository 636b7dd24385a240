//! Crop rendering for annotated regions.
//!
//! Annotators draw on an image displayed at a fixed 800x600 canvas, so
//! the source is resized onto that canvas before any crop is taken. Each
//! crop gets the violation name stamped in its top-right corner so the
//! classifier sees which claim it is judging.

use std::io::Cursor;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};

use crate::error::CoreError;
use crate::geometry::PixelRegion;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Width of the canvas annotation coordinates were authored in.
pub const CANVAS_WIDTH: u32 = 800;

/// Height of the canvas annotation coordinates were authored in.
pub const CANVAS_HEIGHT: u32 = 600;

/// Maximum characters per label line before wrapping.
pub const LABEL_WRAP_COLUMNS: usize = 30;

/// Glyph cell size of the bitmap font (square).
const GLYPH_SIZE: u32 = 8;

/// Vertical distance between label baselines.
const LINE_HEIGHT: u32 = GLYPH_SIZE + 2;

/// Padding around the label text inside its band.
const LABEL_PADDING: u32 = 4;

const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const OFF_CANVAS: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_FOREGROUND: Rgb<u8> = Rgb([255, 255, 255]);

// ---------------------------------------------------------------------------
// Canvas and crop
// ---------------------------------------------------------------------------

/// Decode image bytes and resize them onto the annotation canvas.
pub fn load_canvas(bytes: &[u8]) -> Result<RgbImage, CoreError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(decoded
        .resize_exact(CANVAS_WIDTH, CANVAS_HEIGHT, FilterType::Triangle)
        .to_rgb8())
}

/// Copy `region` out of the canvas.
///
/// The crop always has the region's size; pixels that fall outside the
/// canvas stay black.
pub fn crop_region(canvas: &RgbImage, region: PixelRegion) -> RgbImage {
    let mut crop = RgbImage::from_pixel(region.width, region.height, OFF_CANVAS);
    image::imageops::replace(
        &mut crop,
        canvas,
        region.x.saturating_neg(),
        region.y.saturating_neg(),
    );
    crop
}

/// Draw `label` word-wrapped onto a black band in the crop's top-right
/// corner. The band is clipped to the crop for small regions.
pub fn draw_label(crop: &mut RgbImage, label: &str) {
    let lines = textwrap::wrap(label, LABEL_WRAP_COLUMNS);
    if lines.is_empty() {
        return;
    }

    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
    let band_width = longest * GLYPH_SIZE + 2 * LABEL_PADDING;
    let band_height = lines.len() as u32 * LINE_HEIGHT + LABEL_PADDING + 2;
    let band_x = crop.width().saturating_sub(band_width);

    fill_rect(crop, band_x, 0, band_width, band_height, LABEL_BACKGROUND);

    for (row, line) in lines.iter().enumerate() {
        let top = LABEL_PADDING + row as u32 * LINE_HEIGHT;
        for (col, ch) in line.chars().enumerate() {
            let left = band_x + LABEL_PADDING + col as u32 * GLYPH_SIZE;
            draw_glyph(crop, left, top, ch);
        }
    }
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

/// Crop, label and encode one region in a single step.
pub fn render_labeled_crop(
    canvas: &RgbImage,
    region: PixelRegion,
    label: &str,
) -> Result<Vec<u8>, CoreError> {
    let mut crop = crop_region(canvas, region);
    draw_label(&mut crop, label);
    encode_jpeg(&crop)
}

// ---- private helpers ----

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let x_end = (x + width).min(img.width());
    let y_end = (y + height).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

/// Draw one character of the 8x8 basic-latin font; unknown characters
/// render as `?`.
fn draw_glyph(img: &mut RgbImage, left: u32, top: u32, ch: char) {
    let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
        return;
    };

    for (dy, bits) in glyph.iter().enumerate() {
        for dx in 0..GLYPH_SIZE {
            if bits & (1 << dx) == 0 {
                continue;
            }
            let (px, py) = (left + dx, top + dy as u32);
            if px < img.width() && py < img.height() {
                img.put_pixel(px, py, LABEL_FOREGROUND);
            }
        }
    }
}
