//! xspkit - Sprite-asset compiler and runtime bundle linker
//!
//! This library provides functionality to:
//! - Decompose an indexed sprite sheet into deduplicated 16x16 hardware tiles
//! - Describe multi-tile sprites as chains of relative FRM placements and REF summaries
//! - Write and read the big-endian PCG/FRM/REF bundle formats
//! - Register several bundles and load them into combined, relocated runtime tables

pub mod bitmap;
pub mod bundle;
pub mod claim;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod preview;
pub mod record;
pub mod tile;
pub mod tile_store;

pub use bitmap::{CellRect, IndexedBitmap};
pub use bundle::{Bundle, BundleFormat, BundleKind};
pub use compiler::{compile, Anchor, CompileOptions, CompileOutput, Mode};
pub use error::{Error, Result};
pub use ledger::{BundleDescriptor, Ledger};
pub use loader::{LoadPolicy, SpriteManager};
pub use record::{FrameRecord, ReferenceRecord};
pub use tile::Tile;
pub use tile_store::TileStore;
