//! Indexed source bitmaps.
//!
//! A sprite sheet is held as a flat grid of palette indices where index 0 is
//! transparent. Decoding is delegated to the `png` crate with all colour
//! transformations disabled, so the indices are exactly those stored in the
//! file.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Palette index treated as transparent.
pub const TRANSPARENT: u8 = 0;

/// Number of palette entries carried into compiled bundles.
pub const PALETTE_ENTRIES: usize = 16;

/// A rectangular region of a bitmap, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CellRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// A decoded indexed-colour image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    palette: Vec<[u8; 3]>,
}

impl IndexedBitmap {
    /// Build a bitmap from raw row-major indices.
    ///
    /// Returns `MalformedInput` if the pixel count does not match the
    /// dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::MalformedInput(format!(
                "bitmap of {}x{} needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels, palette: Vec::new() })
    }

    /// A fully transparent bitmap.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width as usize * height as usize],
            palette: Vec::new(),
        }
    }

    pub fn with_palette(mut self, palette: Vec<[u8; 3]>) -> Self {
        self.palette = palette;
        self
    }

    /// Decode an indexed PNG from disk.
    pub fn load_png(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let decode_err = |source| Error::Decode { path: path.to_path_buf(), source };

        let mut reader = decoder.read_info().map_err(decode_err)?;
        let (color_type, palette) = {
            let info = reader.info();
            let palette = info
                .palette
                .as_ref()
                .map(|p| p.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
                .unwrap_or_default();
            (info.color_type, palette)
        };
        if color_type != png::ColorType::Indexed {
            return Err(Error::MalformedInput(format!(
                "'{}' is {:?}, expected an indexed-colour PNG",
                path.display(),
                color_type
            )));
        }

        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).map_err(decode_err)?;
        let pixels = unpack_indices(&buf, frame.width, frame.height, frame.line_size, frame.bit_depth as u8);

        log::info!("Loaded \"{}\": {} x {}", path.display(), frame.width, frame.height);
        Ok(Self { width: frame.width, height: frame.height, pixels, palette })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Palette index at (x, y). Out-of-bounds reads are transparent.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        self.pixels[self.offset(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, index: u8) {
        if x < self.width && y < self.height {
            let i = self.offset(x, y);
            self.pixels[i] = index;
        }
    }

    /// Read a pixel and clear it to transparent in one step.
    pub fn take(&mut self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        let i = self.offset(x, y);
        std::mem::replace(&mut self.pixels[i], TRANSPARENT)
    }

    /// Fill a rectangle with one palette index, clipped to the bitmap.
    pub fn fill(&mut self, rect: CellRect, index: u8) {
        for y in rect.y..rect.bottom().min(self.height) {
            for x in rect.x..rect.right().min(self.width) {
                self.set(x, y, index);
            }
        }
    }

    /// True when no opaque pixel remains inside `rect`.
    pub fn is_empty_region(&self, rect: CellRect) -> bool {
        (rect.y..rect.bottom()).all(|y| (rect.x..rect.right()).all(|x| self.get(x, y) == TRANSPARENT))
    }

    /// Iterate the grid of `frame_w` x `frame_h` cells, row-major.
    ///
    /// Partial cells along the right and bottom edges are not included.
    pub fn cells(&self, frame_w: u32, frame_h: u32) -> impl Iterator<Item = CellRect> {
        let columns = if frame_w == 0 { 0 } else { self.width / frame_w };
        let rows = if frame_h == 0 { 0 } else { self.height / frame_h };
        (0..rows).flat_map(move |row| {
            (0..columns).map(move |col| CellRect::new(col * frame_w, row * frame_h, frame_w, frame_h))
        })
    }

    /// The first sixteen palette entries as X68000 GRB-I words.
    pub fn palette_grbi(&self) -> [u16; PALETTE_ENTRIES] {
        let mut out = [0u16; PALETTE_ENTRIES];
        for (slot, rgb) in out.iter_mut().zip(self.palette.iter()) {
            *slot = rgb8_to_grbi(rgb[0], rgb[1], rgb[2]);
        }
        out
    }

    /// Text dump of a region, one hex digit per opaque pixel.
    ///
    /// Transparent pixels on 8-pixel grid lines print as `.` so tile
    /// boundaries are visible.
    pub fn render_region(&self, rect: CellRect) -> String {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let rule = "--".repeat(rect.w as usize);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let px = self.get(x, y);
                let c = if px != TRANSPARENT {
                    HEX[(px & 0xF) as usize] as char
                } else if x % 8 == 0 || y % 8 == 0 {
                    '.'
                } else {
                    ' '
                };
                out.push(c);
                out.push(' ');
            }
            out.push_str("|\n");
        }
        let _ = writeln!(out, "{}", rule);
        out
    }
}

/// Convert an 8-bit RGB triple to the 16-bit GRB-I palette word.
pub fn rgb8_to_grbi(r: u8, g: u8, b: u8) -> u16 {
    let (r, g, b) = ((r >> 3) as u16, (g >> 3) as u16, (b >> 3) as u16);
    ((r & 0x1F) << 6) | ((g & 0x1F) << 11) | ((b & 0x1F) << 1)
}

/// Inverse of [`rgb8_to_grbi`], replicating high bits into the low ones.
pub fn grbi_to_rgb8(word: u16) -> [u8; 3] {
    let expand = |v: u16| {
        let v = (v & 0x1F) as u8;
        (v << 3) | (v >> 2)
    };
    [expand(word >> 6), expand(word >> 11), expand(word >> 1)]
}

fn unpack_indices(buf: &[u8], width: u32, height: u32, line_size: usize, bit_depth: u8) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    let depth = bit_depth.clamp(1, 8) as usize;
    let per_byte = 8 / depth;
    let mask = ((1u16 << depth) - 1) as u8;
    for y in 0..height as usize {
        let line = &buf[y * line_size..(y + 1) * line_size];
        for x in 0..width as usize {
            let byte = line[x / per_byte];
            let shift = 8 - depth * (x % per_byte + 1);
            pixels.push((byte >> shift) & mask);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(IndexedBitmap::new(4, 4, vec![0; 15]).is_err());
        assert!(IndexedBitmap::new(4, 4, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_take_clears_pixel() {
        let mut bmp = IndexedBitmap::blank(4, 4);
        bmp.set(1, 2, 7);
        assert_eq!(bmp.take(1, 2), 7);
        assert_eq!(bmp.get(1, 2), TRANSPARENT);
        assert_eq!(bmp.take(9, 9), TRANSPARENT);
    }

    #[test]
    fn test_cells_skip_partial_edges() {
        let bmp = IndexedBitmap::blank(50, 40);
        let cells: Vec<_> = bmp.cells(16, 32).collect();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0], CellRect::new(0, 0, 16, 32));
        assert_eq!(cells[2], CellRect::new(32, 0, 16, 32));
    }

    #[test]
    fn test_cells_row_major() {
        let bmp = IndexedBitmap::blank(32, 32);
        let cells: Vec<_> = bmp.cells(16, 16).collect();
        assert_eq!(cells[1], CellRect::new(16, 0, 16, 16));
        assert_eq!(cells[2], CellRect::new(0, 16, 16, 16));
    }

    #[test]
    fn test_unpack_four_bit_rows() {
        // Two rows of 3 pixels at 4bpp, each row padded to 2 bytes.
        let buf = [0x12, 0x30, 0x45, 0x60];
        let px = unpack_indices(&buf, 3, 2, 2, 4);
        assert_eq!(px, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_unpack_one_bit() {
        let px = unpack_indices(&[0b1010_0000], 4, 1, 1, 1);
        assert_eq!(px, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_grbi_packing() {
        assert_eq!(rgb8_to_grbi(0, 0, 0), 0);
        assert_eq!(rgb8_to_grbi(255, 0, 0), 0x1F << 6);
        assert_eq!(rgb8_to_grbi(0, 255, 0), 0x1F << 11);
        assert_eq!(rgb8_to_grbi(0, 0, 255), 0x1F << 1);
        assert_eq!(grbi_to_rgb8(rgb8_to_grbi(255, 255, 255)), [255, 255, 255]);
    }

    #[test]
    fn test_render_region_marks_grid() {
        let mut bmp = IndexedBitmap::blank(16, 16);
        bmp.set(1, 1, 0xA);
        let dump = bmp.render_region(CellRect::new(0, 0, 16, 16));
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 18);
        assert!(lines[2].starts_with(". A "));
        assert!(lines[1].starts_with(". . "));
    }

    #[test]
    fn test_empty_region() {
        let mut bmp = IndexedBitmap::blank(32, 32);
        let rect = CellRect::new(16, 16, 16, 16);
        assert!(bmp.is_empty_region(rect));
        bmp.set(20, 20, 1);
        assert!(!bmp.is_empty_region(rect));
        assert!(bmp.is_empty_region(CellRect::new(0, 0, 16, 16)));
    }
}
