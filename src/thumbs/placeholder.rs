// Placeholder thumbnails
//
// When frame extraction is unavailable or keeps failing, a flat-color JPEG
// stands in. The color is derived from the video id so the same video always
// gets the same placeholder, with a play-triangle glyph in the center.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::constants::{THUMB_HEIGHT, THUMB_WIDTH};
use crate::error::{Result, ShelfError};

/// Deterministic background color for a video id.
fn color_for_id(id: &str) -> Rgb<u8> {
    let digest = blake3::hash(id.as_bytes());
    let bytes = digest.as_bytes();
    // Darken so the white glyph stays visible
    Rgb([bytes[0] / 2 + 32, bytes[1] / 2 + 32, bytes[2] / 2 + 32])
}

/// Write a placeholder JPEG for the given video id.
pub fn write_placeholder(id: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let background = color_for_id(id);
    let mut img = RgbImage::from_pixel(THUMB_WIDTH, THUMB_HEIGHT, background);
    draw_play_glyph(&mut img);

    let tmp_path = output_path.with_extension("tmp.jpg");
    img.save(&tmp_path)
        .map_err(|e| ShelfError::Other(format!("Failed to write placeholder: {}", e)))?;
    std::fs::rename(&tmp_path, output_path)?;
    Ok(())
}

/// Right-pointing triangle centered on the canvas.
fn draw_play_glyph(img: &mut RgbImage) {
    let glyph = Rgb([245u8, 245, 245]);
    let cx = THUMB_WIDTH as i32 / 2;
    let cy = THUMB_HEIGHT as i32 / 2;
    let half = THUMB_HEIGHT as i32 / 6;

    for dx in -half / 2..=half {
        // Triangle narrows as x moves right
        let span = half - (dx + half / 2) * half / (half + half / 2);
        for dy in -span..=span {
            let x = cx + dx;
            let y = cy + dy;
            if x >= 0 && y >= 0 && (x as u32) < THUMB_WIDTH && (y as u32) < THUMB_HEIGHT {
                img.put_pixel(x as u32, y as u32, glyph);
            }
        }
    }
}
