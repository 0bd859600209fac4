//! Hardware tiles and the clipper that produces them.
//!
//! A tile is a 16x16 pattern at 4 bits per pixel, stored as four 8x8
//! sub-tiles in column-major order: top-left, bottom-left, top-right,
//! bottom-right. Each sub-tile is 8 rows of 4 bytes with the left pixel of
//! every pair in the high nibble.

use std::fmt;

use crate::bitmap::{CellRect, IndexedBitmap};

/// Side length of a tile in pixels.
pub const TILE_PX: u32 = 16;
/// Side length of a sub-tile in pixels.
pub const SUBTILE_PX: u32 = 8;
/// Bytes in one 8x8 sub-tile.
pub const SUBTILE_BYTES: usize = 32;
/// Bytes in one tile record.
pub const TILE_BYTES: usize = 128;

/// Sub-tile origins relative to the tile's top-left, in storage order.
const SUBTILE_ORIGINS: [(u32, u32); 4] = [(0, 0), (0, 8), (8, 0), (8, 8)];

/// One packed 16x16 4bpp pattern. Identity is the exact byte content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile(pub [u8; TILE_BYTES]);

impl Tile {
    pub const fn blank() -> Self {
        Tile([0; TILE_BYTES])
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; TILE_BYTES] = bytes.try_into().ok()?;
        Some(Tile(arr))
    }

    pub fn as_bytes(&self) -> &[u8; TILE_BYTES] {
        &self.0
    }

    /// Palette index of the pixel at (x, y) within the tile.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        debug_assert!(x < TILE_PX && y < TILE_PX);
        let sub = ((x / SUBTILE_PX) * 2 + (y / SUBTILE_PX)) as usize;
        let (sx, sy) = (x % SUBTILE_PX, y % SUBTILE_PX);
        let byte = self.0[sub * SUBTILE_BYTES + sy as usize * 4 + sx as usize / 2];
        if sx % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::blank()
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile(")?;
        for b in &self.0[..8] {
            write!(f, "{:02X}", b)?;
        }
        write!(f, "..)")
    }
}

/// Cut the 16x16 block at (x, y) out of `bitmap` as a tile.
///
/// Pixels are consumed: every pixel read is cleared in `bitmap`. Positions
/// outside `cell` are treated as transparent and left untouched.
pub fn clip_tile(bitmap: &mut IndexedBitmap, x: u32, y: u32, cell: CellRect) -> Tile {
    let mut tile = Tile::blank();
    for (i, &(ox, oy)) in SUBTILE_ORIGINS.iter().enumerate() {
        let out = &mut tile.0[i * SUBTILE_BYTES..(i + 1) * SUBTILE_BYTES];
        clip_subtile(bitmap, x + ox, y + oy, cell, out);
    }
    tile
}

fn clip_subtile(bitmap: &mut IndexedBitmap, sx: u32, sy: u32, cell: CellRect, out: &mut [u8]) {
    let mut cursor = 0;
    for y in sy..sy + SUBTILE_PX {
        for x in (sx..sx + SUBTILE_PX).step_by(2) {
            let mut take = |px: u32| {
                if cell.contains(px, y) {
                    bitmap.take(px, y) & 0x0F
                } else {
                    0
                }
            };
            let hi = take(x);
            let lo = take(x + 1);
            out[cursor] = (hi << 4) | lo;
            cursor += 1;
        }
    }
}
