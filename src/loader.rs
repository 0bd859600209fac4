//! Runtime loader and relocator.
//!
//! [`SpriteManager`] is the owned handle the hardware-facing code talks to.
//! Bundles are registered first, which only records their sizes; a single
//! [`SpriteManager::load`] then allocates the combined PCG, FRM and REF
//! tables and copies every bundle into them in registration order, rebasing
//! REF frame offsets against the combined FRM table and FRM pattern numbers
//! against the combined PCG table.
//!
//! Registration order is load-bearing: the base indices handed out by
//! registration are exactly the cursor positions the loader uses.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bundle::{read_file, with_extension, BundleKind, ContainerHeader, EXT_FRM, EXT_REF};
use crate::error::{Error, Result};
use crate::ledger::{BundleDescriptor, BundleSource, Ledger};
use crate::record::{
    add_be_u16, add_be_u32, decode_frames, decode_refs, FrameRecord, ReferenceRecord, FRM_PATTERN_FIELD,
    FRM_RECORD_BYTES, REF_OFFSET_FIELD, REF_RECORD_BYTES,
};
use crate::tile::TILE_BYTES;

/// What to do when one bundle cannot be read during load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Leave the bundle's slots zeroed and carry on with the rest.
    #[default]
    Lenient,
    /// Abort the whole load and return to the pre-registration state.
    Strict,
}

/// Outcome of loading one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Loaded,
    /// The bundle contributed nothing; the message says why.
    Degraded(String),
}

/// Where one bundle landed in the combined tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedBundle {
    pub path: PathBuf,
    pub kind: BundleKind,
    /// First REF record number (composite) or pattern number (single).
    pub base: u32,
    pub ref_offset: usize,
    pub frm_offset: usize,
    pub pcg_offset: usize,
    pub status: BundleStatus,
}

/// The combined runtime tables, owned by the manager once loaded.
#[derive(Debug, Default)]
struct RuntimeTables {
    pcg: Vec<u8>,
    frm: Vec<u8>,
    refs: Vec<u8>,
    /// Placement scratchpad, one byte per pattern plus one.
    pcg_alt: Vec<u8>,
    bundles: Vec<LoadedBundle>,
}

#[derive(Debug)]
enum State {
    Registering(Ledger),
    Loaded(RuntimeTables),
}

/// Owned runtime context: registration ledger, then combined tables.
#[derive(Debug)]
pub struct SpriteManager {
    policy: LoadPolicy,
    state: State,
}

impl Default for SpriteManager {
    fn default() -> Self {
        Self::new(LoadPolicy::default())
    }
}

/// Bytes read for one bundle, before relocation.
struct Sections {
    refs: Vec<u8>,
    frm: Vec<u8>,
    pcg: Vec<u8>,
}

impl SpriteManager {
    /// A fresh manager, ready for registration.
    pub fn new(policy: LoadPolicy) -> Self {
        Self { policy, state: State::Registering(Ledger::new()) }
    }

    /// Drop everything and return to the pre-registration state.
    pub fn init(&mut self) {
        self.state = State::Registering(Ledger::new());
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: LoadPolicy) {
        self.policy = policy;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Loaded(_))
    }

    fn ledger_mut(&mut self) -> Result<&mut Ledger> {
        match &mut self.state {
            State::Registering(ledger) => Ok(ledger),
            State::Loaded(_) => Err(Error::ConcurrencyMisuse("registration after load")),
        }
    }

    /// Pending registrations, if load has not happened yet.
    pub fn ledger(&self) -> Option<&Ledger> {
        match &self.state {
            State::Registering(ledger) => Some(ledger),
            State::Loaded(_) => None,
        }
    }

    /// Register a surveyed bundle. Returns its base index.
    pub fn register(&mut self, desc: BundleDescriptor) -> Result<u32> {
        self.ledger_mut()?.push(desc)
    }

    /// Register a composite bundle from `<base>.ref`, `<base>.frm`, `<base>.xsp`.
    /// Returns the number of its first composite sprite.
    pub fn register_composite(&mut self, base: &Path) -> Result<u32> {
        self.ledger_mut()?;
        let desc = BundleDescriptor::composite_files(base)?;
        self.register(desc)
    }

    /// Register a single-pattern bundle from `<base>.sp`. Returns the number
    /// of its first pattern.
    pub fn register_single(&mut self, base: &Path) -> Result<u32> {
        self.ledger_mut()?;
        let desc = BundleDescriptor::single_files(base)?;
        self.register(desc)
    }

    /// Register a container or separate-file bundle, detecting which.
    pub fn register_bundle(&mut self, path: &Path) -> Result<u32> {
        self.ledger_mut()?;
        let desc = BundleDescriptor::detect(path)?;
        self.register(desc)
    }

    /// Allocate the combined tables and load every registered bundle.
    ///
    /// Callable once; a second call fails with `ConcurrencyMisuse`.
    pub fn load(&mut self) -> Result<()> {
        let ledger = match std::mem::replace(&mut self.state, State::Registering(Ledger::new())) {
            State::Registering(ledger) => ledger,
            loaded @ State::Loaded(_) => {
                self.state = loaded;
                return Err(Error::ConcurrencyMisuse("load called twice"));
            }
        };

        log::debug!(
            "buffer summary: FRM {} bytes, REF {} bytes, PCG {} bytes",
            ledger.frm_bytes(),
            ledger.ref_bytes(),
            ledger.pcg_bytes()
        );
        let tile_total = ledger.pcg_bytes() / TILE_BYTES;
        let mut tables = RuntimeTables {
            pcg: vec![0; ledger.pcg_bytes()],
            frm: vec![0; ledger.frm_bytes()],
            refs: vec![0; ledger.ref_bytes()],
            pcg_alt: vec![0; tile_total + 1],
            bundles: Vec::with_capacity(ledger.len()),
        };

        let (mut ref_at, mut frm_at, mut pcg_at) = (0usize, 0usize, 0usize);
        for desc in ledger.into_entries() {
            let base = match desc.kind {
                BundleKind::Composite => ref_at / REF_RECORD_BYTES,
                BundleKind::SinglePattern => pcg_at / TILE_BYTES,
            } as u32;

            let status = match load_one(&desc, frm_at, pcg_at / TILE_BYTES) {
                Ok(sections) => {
                    tables.refs[ref_at..ref_at + desc.ref_bytes].copy_from_slice(&sections.refs);
                    tables.frm[frm_at..frm_at + desc.frm_bytes].copy_from_slice(&sections.frm);
                    tables.pcg[pcg_at..pcg_at + desc.pcg_bytes].copy_from_slice(&sections.pcg);
                    log::info!("\"{}\" --> OK", desc.source.path().display());
                    BundleStatus::Loaded
                }
                Err(e) if self.policy == LoadPolicy::Strict => {
                    // Buffers are dropped with `tables`; state is already a fresh ledger.
                    return Err(e);
                }
                Err(e) => {
                    log::warn!("\"{}\" contributes nothing: {}", desc.source.path().display(), e);
                    BundleStatus::Degraded(e.to_string())
                }
            };

            tables.bundles.push(LoadedBundle {
                path: desc.source.path().to_path_buf(),
                kind: desc.kind,
                base,
                ref_offset: ref_at,
                frm_offset: frm_at,
                pcg_offset: pcg_at,
                status,
            });
            ref_at += desc.ref_bytes;
            frm_at += desc.frm_bytes;
            pcg_at += desc.pcg_bytes;
        }

        self.state = State::Loaded(tables);
        Ok(())
    }

    /// Release the combined tables and return to the pre-registration state.
    pub fn shutdown(&mut self) {
        if self.is_loaded() {
            log::debug!("releasing combined sprite tables");
        }
        self.init();
    }

    fn tables(&self) -> Option<&RuntimeTables> {
        match &self.state {
            State::Loaded(t) => Some(t),
            State::Registering(_) => None,
        }
    }

    /// Combined PCG pattern data.
    pub fn pcg_data(&self) -> Option<&[u8]> {
        self.tables().map(|t| t.pcg.as_slice())
    }

    /// Combined FRM table.
    pub fn frm_data(&self) -> Option<&[u8]> {
        self.tables().map(|t| t.frm.as_slice())
    }

    /// Combined REF table; frame offsets index into [`Self::frm_data`].
    pub fn ref_data(&self) -> Option<&[u8]> {
        self.tables().map(|t| t.refs.as_slice())
    }

    /// Scratch memory for pattern placement, (pattern count + 1) bytes.
    pub fn pcg_alt_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.state {
            State::Loaded(t) => Some(t.pcg_alt.as_mut_slice()),
            State::Registering(_) => None,
        }
    }

    /// Per-bundle placement and status from the last load.
    pub fn loaded_bundles(&self) -> &[LoadedBundle] {
        self.tables().map(|t| t.bundles.as_slice()).unwrap_or(&[])
    }

    pub fn tile_count(&self) -> usize {
        self.pcg_data().map_or(0, |p| p.len() / TILE_BYTES)
    }

    pub fn sprite_count(&self) -> usize {
        self.ref_data().map_or(0, |r| r.len() / REF_RECORD_BYTES)
    }

    pub fn references(&self) -> Vec<ReferenceRecord> {
        self.ref_data().map(|r| decode_refs(r).collect()).unwrap_or_default()
    }

    pub fn frames(&self) -> Vec<FrameRecord> {
        self.frm_data().map(|f| decode_frames(f).collect()).unwrap_or_default()
    }

    /// Frame records of composite sprite number `sprite`.
    pub fn sprite_frames(&self, sprite: usize) -> Option<Vec<FrameRecord>> {
        let tables = self.tables()?;
        let r = decode_refs(&tables.refs).nth(sprite)?;
        let bytes = tables.frm.get(r.frame_range())?;
        Some(decode_frames(bytes).collect())
    }
}

/// Read, check and relocate one bundle.
fn load_one(desc: &BundleDescriptor, frm_base: usize, pattern_base: usize) -> Result<Sections> {
    let mut sections = read_sections(desc)?;
    if desc.kind == BundleKind::Composite {
        check_records(desc, &sections)?;
        relocate_refs(&mut sections.refs, frm_base as u32);
        relocate_frames(&mut sections.frm, pattern_base as u16);
    }
    Ok(sections)
}

fn read_sections(desc: &BundleDescriptor) -> Result<Sections> {
    let sections = match &desc.source {
        BundleSource::Files { base } => {
            let (refs, frm) = if desc.kind == BundleKind::Composite {
                (read_file(&with_extension(base, EXT_REF))?, read_file(&with_extension(base, EXT_FRM))?)
            } else {
                (Vec::new(), Vec::new())
            };
            let pcg = read_file(&with_extension(base, desc.kind.pcg_extension()))?;
            Sections { refs, frm, pcg }
        }
        BundleSource::Container { path } => {
            let bytes = read_file(path)?;
            let header = ContainerHeader::parse(&bytes, path)?;
            let section = |offset: u32, len: usize| {
                let start = offset as usize;
                bytes.get(start..start + len).map(<[u8]>::to_vec).unwrap_or_default()
            };
            Sections {
                refs: section(header.ref_offset, header.ref_bytes()),
                frm: section(header.frm_offset, header.frm_bytes as usize),
                pcg: section(header.pcg_offset, header.pcg_bytes()),
            }
        }
    };

    let path = desc.source.path();
    for (name, got, want) in [
        ("REF", sections.refs.len(), desc.ref_bytes),
        ("FRM", sections.frm.len(), desc.frm_bytes),
        ("PCG", sections.pcg.len(), desc.pcg_bytes),
    ] {
        if got != want {
            return Err(Error::validation(
                path,
                format!("{} data is {} bytes, {} were registered", name, got, want),
            ));
        }
    }
    Ok(sections)
}

/// Every record must address data inside its own bundle, so that after
/// relocation it addresses data inside the combined tables.
fn check_records(desc: &BundleDescriptor, sections: &Sections) -> Result<()> {
    let path = desc.source.path();
    let tiles = sections.pcg.len() / TILE_BYTES;
    for (i, f) in decode_frames(&sections.frm).enumerate() {
        if f.pattern as usize >= tiles {
            return Err(Error::validation(
                path,
                format!("FRM record {} uses pattern {} of {}", i, f.pattern, tiles),
            ));
        }
    }
    let frm_len = sections.frm.len();
    for (i, r) in decode_refs(&sections.refs).enumerate() {
        let range = r.frame_range();
        let misaligned = r.frame_offset as usize % FRM_RECORD_BYTES != 0;
        if misaligned || range.end > frm_len {
            return Err(Error::validation(
                path,
                format!("REF record {} points at FRM bytes {:?} of {}", i, range, frm_len),
            ));
        }
    }
    Ok(())
}

/// Add `frm_base` to every REF record's frame offset.
pub fn relocate_refs(refs: &mut [u8], frm_base: u32) {
    for rec in refs.chunks_exact_mut(REF_RECORD_BYTES) {
        add_be_u32(rec, REF_OFFSET_FIELD, frm_base);
    }
}

/// Add `pattern_base` to every FRM record's pattern number.
pub fn relocate_frames(frm: &mut [u8], pattern_base: u16) {
    for rec in frm.chunks_exact_mut(FRM_RECORD_BYTES) {
        add_be_u16(rec, FRM_PATTERN_FIELD, pattern_base);
    }
}
