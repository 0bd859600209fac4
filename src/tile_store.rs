//! Content-addressed, append-only tile storage.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tile::{Tile, TILE_BYTES};

/// Maximum number of patterns addressable by a 16-bit pattern index.
pub const MAX_TILES: usize = 65536;

/// Ordered set of unique tiles. A tile's position is its pattern index.
///
/// Matching is byte-exact: a mirrored copy of a stored tile is a different
/// tile.
#[derive(Debug, Clone, Default)]
pub struct TileStore {
    tiles: Vec<Tile>,
    index: HashMap<Tile, u16>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `tile`, appending it if it is not stored yet.
    ///
    /// Fails with `CapacityExceeded` when a new tile would be the 65537th.
    pub fn insert_or_find(&mut self, tile: Tile) -> Result<u16> {
        if let Some(&idx) = self.index.get(&tile) {
            return Ok(idx);
        }
        if self.tiles.len() >= MAX_TILES {
            return Err(Error::CapacityExceeded { what: "tile store", limit: MAX_TILES });
        }
        let idx = self.tiles.len() as u16;
        self.tiles.push(tile);
        self.index.insert(tile, idx);
        Ok(idx)
    }

    /// Look up a tile without inserting it.
    pub fn find(&self, tile: &Tile) -> Option<u16> {
        self.index.get(tile).copied()
    }

    pub fn get(&self, index: u16) -> Option<&Tile> {
        self.tiles.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Raw PCG bytes, tiles back-to-back in index order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.tiles.len() * TILE_BYTES);
        for tile in &self.tiles {
            out.extend_from_slice(tile.as_bytes());
        }
        out
    }
}
