//! Locating the next opaque 16x16 block inside a sprite cell.
//!
//! A claim scans the cell top-down for the first row holding an opaque
//! pixel, then scans left-to-right inside a short band starting at that row
//! for the first opaque column. The block at that (column, row) is clipped
//! out and cleared, so repeated claims walk the cell until it is empty.

use crate::bitmap::{CellRect, IndexedBitmap, TRANSPARENT};
use crate::tile::{clip_tile, Tile};

/// Rows inspected by the column scan, starting at the claimed row.
pub const CLAIM_BAND_ROWS: u32 = 8;

/// Top-left corner of a claimed block, in absolute bitmap coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub x: u32,
    pub y: u32,
}

/// Find the next block to cut from `cell`, or `None` once it is empty.
pub fn find_claim(bitmap: &IndexedBitmap, cell: CellRect) -> Option<Claim> {
    let opaque = |x: u32, y: u32| bitmap.get(x, y) != TRANSPARENT;

    let row = (cell.y..cell.bottom()).find(|&y| (cell.x..cell.right()).any(|x| opaque(x, y)))?;
    let band_end = (row + CLAIM_BAND_ROWS).min(cell.bottom());
    let col = (cell.x..cell.right()).find(|&x| (row..band_end).any(|y| opaque(x, y)))?;

    Some(Claim { x: col, y: row })
}

/// Iterator over the successive claims of one cell, consuming the bitmap as
/// it goes.
pub struct CellClaims<'a> {
    bitmap: &'a mut IndexedBitmap,
    cell: CellRect,
}

impl<'a> CellClaims<'a> {
    pub fn new(bitmap: &'a mut IndexedBitmap, cell: CellRect) -> Self {
        Self { bitmap, cell }
    }
}

impl Iterator for CellClaims<'_> {
    type Item = (Claim, Tile);

    fn next(&mut self) -> Option<Self::Item> {
        let claim = find_claim(&*self.bitmap, self.cell)?;
        let tile = clip_tile(self.bitmap, claim.x, claim.y, self.cell);
        Some((claim, tile))
    }
}
