//! Sprite sheet compiler.
//!
//! Walks a sheet cell by cell, claims opaque 16x16 blocks, deduplicates the
//! resulting tiles and, for composite sprites, records each placement as a
//! delta from the previous one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bitmap::{CellRect, IndexedBitmap};
use crate::bundle::{Bundle, BundleKind};
use crate::claim::CellClaims;
use crate::error::{Error, Result};
use crate::record::{FrameRecord, ReferenceRecord, FRM_RECORD_BYTES};
use crate::tile::TILE_PX;
use crate::tile_store::TileStore;

/// Requested conversion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Single patterns for 16x16 frames, composite sprites otherwise.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Composite sprites with FRM/REF tables.
    #[serde(rename = "xobj")]
    Composite,
    /// Plain hardware patterns only.
    #[serde(rename = "sp")]
    SinglePattern,
}

impl Mode {
    /// Parse a mode argument by its first character (`a`, `x` or `s`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()?.to_ascii_lowercase() {
            'a' => Some(Mode::Auto),
            'x' => Some(Mode::Composite),
            's' => Some(Mode::SinglePattern),
            _ => None,
        }
    }

    /// Like [`Mode::from_code`], but warns and falls back to `Auto`.
    pub fn from_code_lenient(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            log::warn!("Unrecognized mode '{}'; using auto.", code);
            Mode::Auto
        })
    }

    /// Pick the concrete bundle kind for a frame size.
    pub fn resolve(self, frame_w: u32, frame_h: u32) -> BundleKind {
        match self {
            Mode::Auto if frame_w == TILE_PX && frame_h == TILE_PX => BundleKind::SinglePattern,
            Mode::Auto | Mode::Composite => BundleKind::Composite,
            Mode::SinglePattern => BundleKind::SinglePattern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// One of the nine anchor points of a cell that FRM coordinates are measured
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub h: HAlign,
    pub v: VAlign,
}

impl Default for Anchor {
    fn default() -> Self {
        Self { h: HAlign::Center, v: VAlign::Center }
    }
}

impl Anchor {
    pub const fn new(h: HAlign, v: VAlign) -> Self {
        Self { h, v }
    }

    /// Parse a two-letter code: X from `l`/`c`/`r`, then Y from `t`/`c`/`b`.
    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.chars().map(|c| c.to_ascii_lowercase());
        let h = match chars.next()? {
            'l' => HAlign::Left,
            'c' => HAlign::Center,
            'r' => HAlign::Right,
            _ => return None,
        };
        let v = match chars.next()? {
            't' => VAlign::Top,
            'c' => VAlign::Center,
            'b' => VAlign::Bottom,
            _ => return None,
        };
        Some(Self { h, v })
    }

    /// Like [`Anchor::from_code`], but warns and falls back to center-center.
    pub fn from_code_lenient(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            log::warn!("Invalid origin '{}'; using cc.", code);
            Anchor::default()
        })
    }

    /// Anchor position inside a `w` x `h` cell.
    pub fn offset(&self, w: u32, h: u32) -> (i32, i32) {
        let x = match self.h {
            HAlign::Left => 0,
            HAlign::Center => w / 2,
            HAlign::Right => w.saturating_sub(1),
        };
        let y = match self.v {
            VAlign::Top => 0,
            VAlign::Center => h / 2,
            VAlign::Bottom => h.saturating_sub(1),
        };
        (x as i32, y as i32)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = match self.h {
            HAlign::Left => 'l',
            HAlign::Center => 'c',
            HAlign::Right => 'r',
        };
        let v = match self.v {
            VAlign::Top => 't',
            VAlign::Center => 'c',
            VAlign::Bottom => 'b',
        };
        write!(f, "{}{}", h, v)
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.chars().count() != 2 {
            return Err(Error::MalformedInput(format!("origin '{}' must be two characters", s)));
        }
        Self::from_code(s).ok_or_else(|| Error::MalformedInput(format!("unrecognized origin '{}'", s)))
    }
}

/// Settings for one compiler run.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub frame_w: u32,
    pub frame_h: u32,
    pub mode: Mode,
    pub anchor: Anchor,
    /// Keep a text dump of every cell taken before it is chopped.
    pub dump_regions: bool,
}

impl CompileOptions {
    pub fn new(frame_w: u32, frame_h: u32) -> Self {
        Self { frame_w, frame_h, ..Default::default() }
    }
}

/// Result of compiling a sheet.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub bundle: Bundle,
    pub columns: u32,
    pub rows: u32,
    /// Region dumps, one per cell, when requested.
    pub dumps: Vec<String>,
}

impl CompileOutput {
    pub fn cell_count(&self) -> u32 {
        self.columns * self.rows
    }
}

/// Builds the PCG/FRM/REF tables for one sheet.
#[derive(Debug)]
struct Composer {
    kind: BundleKind,
    anchor: Anchor,
    store: TileStore,
    frames: Vec<u8>,
    refs: Vec<u8>,
}

impl Composer {
    fn new(kind: BundleKind, anchor: Anchor) -> Self {
        Self { kind, anchor, store: TileStore::new(), frames: Vec::new(), refs: Vec::new() }
    }

    /// Chop every block out of `cell`, emitting records as needed.
    fn chop_cell(&mut self, bitmap: &mut IndexedBitmap, cell: CellRect) -> Result<()> {
        let frm_offset = u32::try_from(self.frames.len())
            .map_err(|_| Error::CapacityExceeded { what: "FRM table bytes", limit: u32::MAX as usize })?;
        let (ox, oy) = self.anchor.offset(cell.w, cell.h);
        let (mut last_x, mut last_y) = (0i32, 0i32);
        let mut count: u16 = 0;

        for (claim, tile) in CellClaims::new(bitmap, cell) {
            let pattern = self.store.insert_or_find(tile)?;
            log::debug!("claim ({}, {}) -> pattern {}", claim.x, claim.y, pattern);
            if self.kind != BundleKind::Composite {
                continue;
            }

            count = count
                .checked_add(1)
                .ok_or(Error::CapacityExceeded { what: "frames per sprite", limit: u16::MAX as usize })?;
            let vx = (claim.x - cell.x) as i32 - ox;
            let vy = (claim.y - cell.y) as i32 - oy;
            let record = FrameRecord::new(to_i16(vx - last_x)?, to_i16(vy - last_y)?, pattern);
            self.frames.extend_from_slice(&record.to_bytes());
            last_x = vx;
            last_y = vy;
        }

        if self.kind == BundleKind::Composite {
            self.refs.extend_from_slice(&ReferenceRecord::new(count, frm_offset).to_bytes());
        }
        Ok(())
    }

    fn finish(self, palette: [u16; 16]) -> Bundle {
        Bundle { kind: self.kind, palette, pcg: self.store.to_bytes(), frm: self.frames, refs: self.refs }
    }
}

fn to_i16(v: i32) -> Result<i16> {
    i16::try_from(v).map_err(|_| Error::CapacityExceeded { what: "relative sprite offset", limit: i16::MAX as usize })
}

/// Check the frame size against the tile size and the sheet.
pub fn validate_frame(bitmap: &IndexedBitmap, frame_w: u32, frame_h: u32) -> Result<()> {
    if frame_w < TILE_PX || frame_h < TILE_PX {
        return Err(Error::MalformedInput(format!(
            "frame sizes under {0} x {0} are not supported (got {1} x {2})",
            TILE_PX, frame_w, frame_h
        )));
    }
    if frame_w > bitmap.width() || frame_h > bitmap.height() {
        return Err(Error::MalformedInput(format!(
            "frame size ({} x {}) exceeds source image ({} x {})",
            frame_w,
            frame_h,
            bitmap.width(),
            bitmap.height()
        )));
    }
    Ok(())
}

/// Compile a sheet. The bitmap is taken by value since compiling consumes
/// its pixels.
pub fn compile(mut bitmap: IndexedBitmap, options: &CompileOptions) -> Result<CompileOutput> {
    let (frame_w, frame_h) = (options.frame_w, options.frame_h);
    validate_frame(&bitmap, frame_w, frame_h)?;

    let kind = options.mode.resolve(frame_w, frame_h);
    let columns = bitmap.width() / frame_w;
    let rows = bitmap.height() / frame_h;
    log::info!("{} x {} cells --> {} sprites ({:?}, origin {})", columns, rows, columns * rows, kind, options.anchor);

    let palette = bitmap.palette_grbi();
    let cells: Vec<CellRect> = bitmap.cells(frame_w, frame_h).collect();
    let mut composer = Composer::new(kind, options.anchor);
    let mut dumps = Vec::new();
    for cell in cells {
        if options.dump_regions {
            dumps.push(bitmap.render_region(cell));
        }
        composer.chop_cell(&mut bitmap, cell)?;
    }

    let bundle = composer.finish(palette);
    match kind {
        BundleKind::SinglePattern => log::info!("Used {} PCG tiles.", bundle.tile_count()),
        BundleKind::Composite => log::info!(
            "Used {} PCG tiles for {} frames.",
            bundle.tile_count(),
            bundle.frm.len() / FRM_RECORD_BYTES
        ),
    }
    Ok(CompileOutput { bundle, columns, rows, dumps })
}
