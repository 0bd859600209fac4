//! PNG previews of compiled tile data.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::bitmap::{grbi_to_rgb8, PALETTE_ENTRIES};
use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::tile::{Tile, TILE_BYTES, TILE_PX};

/// Layout options for a tile sheet preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    /// Tiles per row.
    pub columns: u32,
    /// Integer upscale factor (1 means no scaling).
    pub scale: u8,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self { columns: 16, scale: 1 }
    }
}

/// RGBA colours for the sixteen palette slots. Slot 0 is always transparent.
///
/// An all-zero palette (separate-file bundles carry none) falls back to a
/// grey ramp so tiles stay readable.
pub fn preview_palette(palette: &[u16; PALETTE_ENTRIES]) -> [Rgba<u8>; PALETTE_ENTRIES] {
    let grey = palette.iter().all(|&c| c == 0);
    let mut out = [Rgba([0, 0, 0, 0]); PALETTE_ENTRIES];
    for (i, slot) in out.iter_mut().enumerate().skip(1) {
        *slot = if grey {
            let v = (i * 17) as u8;
            Rgba([v, v, v, 255])
        } else {
            let [r, g, b] = grbi_to_rgb8(palette[i]);
            Rgba([r, g, b, 255])
        };
    }
    out
}

/// Lay out every tile of `bundle` in a grid.
pub fn render_tiles(bundle: &Bundle, options: &PreviewOptions) -> RgbaImage {
    let colours = preview_palette(&bundle.palette);
    let count = bundle.tile_count() as u32;
    let columns = options.columns.max(1).min(count.max(1));
    let rows = count.div_ceil(columns).max(1);
    let mut image = RgbaImage::from_pixel(columns * TILE_PX, rows * TILE_PX, Rgba([0, 0, 0, 0]));

    for (i, chunk) in bundle.pcg.chunks_exact(TILE_BYTES).enumerate() {
        let Some(tile) = Tile::from_bytes(chunk) else { continue };
        let (ox, oy) = ((i as u32 % columns) * TILE_PX, (i as u32 / columns) * TILE_PX);
        for y in 0..TILE_PX {
            for x in 0..TILE_PX {
                image.put_pixel(ox + x, oy + y, colours[tile.pixel(x, y) as usize]);
            }
        }
    }
    scale_image(image, options.scale)
}

/// Scale image by integer factor using nearest-neighbor interpolation.
pub fn scale_image(image: RgbaImage, factor: u8) -> RgbaImage {
    if factor <= 1 {
        return image;
    }
    let (w, h) = image.dimensions();
    image::imageops::resize(&image, w * factor as u32, h * factor as u32, FilterType::Nearest)
}

/// Save an RGBA image as PNG, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }
    image.save(path).map_err(|e| match e {
        image::ImageError::IoError(io) => Error::io(path, io),
        other => Error::io(path, std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
    })
}
