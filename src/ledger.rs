//! Registration bookkeeping for the runtime loader.
//!
//! Registration only surveys sizes: file lengths for separate-file bundles,
//! the 64-byte header for containers. Contents are read later, at load time,
//! in registration order.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::bundle::{
    check_multiple, is_container_path, with_extension, BundleKind, ContainerHeader, CONTAINER_HEADER_BYTES,
    EXT_COMPOSITE_PCG, EXT_FRM, EXT_REF, EXT_SINGLE_PCG,
};
use crate::error::{Error, Result};
use crate::record::{FRM_RECORD_BYTES, REF_RECORD_BYTES};
use crate::tile::TILE_BYTES;
use crate::tile_store::MAX_TILES;

/// Where a registered bundle's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// Separate files sharing a base path.
    Files { base: PathBuf },
    /// One container file; section offsets come from its header.
    Container { path: PathBuf },
}

impl BundleSource {
    pub fn path(&self) -> &Path {
        match self {
            BundleSource::Files { base } => base,
            BundleSource::Container { path } => path,
        }
    }
}

/// Sizes recorded for one bundle at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    pub source: BundleSource,
    pub kind: BundleKind,
    pub ref_bytes: usize,
    pub frm_bytes: usize,
    pub pcg_bytes: usize,
}

impl BundleDescriptor {
    /// Survey a composite bundle stored as `.ref`/`.frm`/`.xsp` files.
    pub fn composite_files(base: &Path) -> Result<Self> {
        let ref_bytes = sized_file(&with_extension(base, EXT_REF), REF_RECORD_BYTES)?;
        let frm_bytes = sized_file(&with_extension(base, EXT_FRM), FRM_RECORD_BYTES)?;
        let pcg_bytes = sized_file(&with_extension(base, EXT_COMPOSITE_PCG), TILE_BYTES)?;
        Ok(Self {
            source: BundleSource::Files { base: base.to_path_buf() },
            kind: BundleKind::Composite,
            ref_bytes,
            frm_bytes,
            pcg_bytes,
        })
    }

    /// Survey a single-pattern bundle stored as a `.sp` file.
    pub fn single_files(base: &Path) -> Result<Self> {
        let pcg_bytes = sized_file(&with_extension(base, EXT_SINGLE_PCG), TILE_BYTES)?;
        Ok(Self {
            source: BundleSource::Files { base: base.to_path_buf() },
            kind: BundleKind::SinglePattern,
            ref_bytes: 0,
            frm_bytes: 0,
            pcg_bytes,
        })
    }

    /// Survey a `.xsb` container by reading its header only. The sections
    /// the header describes must fit inside the file.
    pub fn container(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let file_len = file.metadata().map_err(|e| Error::io(path, e))?.len();
        let mut head = [0u8; CONTAINER_HEADER_BYTES];
        file.read_exact(&mut head).map_err(|e| Error::io(path, e))?;
        let header = ContainerHeader::parse(&head, path)?;
        header.check_extent(file_len, path)?;
        Ok(Self {
            source: BundleSource::Container { path: path.to_path_buf() },
            kind: header.kind,
            ref_bytes: header.ref_bytes(),
            frm_bytes: header.frm_bytes as usize,
            pcg_bytes: header.pcg_bytes(),
        })
    }

    /// Survey whatever lives at `path`: a container, or a base path whose
    /// `.ref` file marks a composite bundle and `.sp` file a single one.
    pub fn detect(path: &Path) -> Result<Self> {
        if is_container_path(path) {
            return Self::container(path);
        }
        if with_extension(path, EXT_REF).exists() {
            return Self::composite_files(path);
        }
        Self::single_files(path)
    }
}

fn sized_file(path: &Path, unit: usize) -> Result<usize> {
    let len = fs::metadata(path).map_err(|e| Error::io(path, e))?.len() as usize;
    check_multiple(path, len, unit)?;
    Ok(len)
}

/// Ordered list of pending bundles plus running byte totals.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<BundleDescriptor>,
    ref_bytes: usize,
    frm_bytes: usize,
    pcg_bytes: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a surveyed bundle and return its base index.
    ///
    /// Composite bundles get the number of their first REF record, single
    /// pattern bundles the number of their first pattern, both counted from
    /// the totals before this bundle. The ledger is untouched on error.
    pub fn push(&mut self, desc: BundleDescriptor) -> Result<u32> {
        let tiles = (self.pcg_bytes + desc.pcg_bytes) / TILE_BYTES;
        if tiles > MAX_TILES {
            return Err(Error::CapacityExceeded { what: "registered PCG patterns", limit: MAX_TILES });
        }
        if self.ref_bytes + desc.ref_bytes > u32::MAX as usize {
            return Err(Error::CapacityExceeded { what: "registered REF bytes", limit: u32::MAX as usize });
        }
        if self.frm_bytes + desc.frm_bytes > u32::MAX as usize {
            return Err(Error::CapacityExceeded { what: "registered FRM bytes", limit: u32::MAX as usize });
        }

        let base = match desc.kind {
            BundleKind::Composite => self.ref_bytes / REF_RECORD_BYTES,
            BundleKind::SinglePattern => self.pcg_bytes / TILE_BYTES,
        };
        self.ref_bytes += desc.ref_bytes;
        self.frm_bytes += desc.frm_bytes;
        self.pcg_bytes += desc.pcg_bytes;
        log::debug!("registered {} ({:?}) at base {}", desc.source.path().display(), desc.kind, base);
        self.entries.push(desc);
        Ok(base as u32)
    }

    pub fn entries(&self) -> &[BundleDescriptor] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BundleDescriptor> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ref_bytes(&self) -> usize {
        self.ref_bytes
    }

    pub fn frm_bytes(&self) -> usize {
        self.frm_bytes
    }

    pub fn pcg_bytes(&self) -> usize {
        self.pcg_bytes
    }
}
