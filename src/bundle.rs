//! Compiled bundles and their on-disk forms.
//!
//! A bundle is written either as separate files sharing one base path
//! (`.xsp`/`.frm`/`.ref` for composite sprites, `.sp` for single patterns) or
//! as one `.xsb` container with a 64-byte big-endian header:
//!
//! ```text
//!  0  magic "XSPB"
//!  4  u16 version (1)
//!  6  u16 kind (0 = single pattern, 1 = composite)
//!  8  u32 REF record count
//! 12  u32 FRM byte count
//! 16  u32 PCG tile count
//! 20  u32 REF section offset
//! 24  u32 FRM section offset
//! 28  u32 PCG section offset
//! 32  u16 palette[16] (GRB-I)
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bitmap::PALETTE_ENTRIES;
use crate::error::{Error, Result};
use crate::record::{decode_frames, decode_refs, FrameRecord, ReferenceRecord, FRM_RECORD_BYTES, REF_RECORD_BYTES};
use crate::tile::TILE_BYTES;

pub const CONTAINER_MAGIC: &[u8; 4] = b"XSPB";
pub const CONTAINER_VERSION: u16 = 1;
pub const CONTAINER_HEADER_BYTES: usize = 64;

pub const EXT_CONTAINER: &str = "xsb";
pub const EXT_COMPOSITE_PCG: &str = "xsp";
pub const EXT_SINGLE_PCG: &str = "sp";
pub const EXT_FRM: &str = "frm";
pub const EXT_REF: &str = "ref";

/// Which kind of sprite data a bundle carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleKind {
    /// Plain hardware patterns, addressed by pattern number.
    SinglePattern,
    /// Multi-tile sprites described by FRM/REF tables.
    Composite,
}

impl BundleKind {
    fn code(self) -> u16 {
        match self {
            BundleKind::SinglePattern => 0,
            BundleKind::Composite => 1,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(BundleKind::SinglePattern),
            1 => Some(BundleKind::Composite),
            _ => None,
        }
    }

    /// Extension of the PCG file in separate-file form.
    pub fn pcg_extension(self) -> &'static str {
        match self {
            BundleKind::SinglePattern => EXT_SINGLE_PCG,
            BundleKind::Composite => EXT_COMPOSITE_PCG,
        }
    }
}

/// On-disk form of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleFormat {
    /// One file per table.
    #[default]
    Separate,
    /// A single `.xsb` container.
    Container,
}

/// The three tables of one compiled sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub kind: BundleKind,
    pub palette: [u16; PALETTE_ENTRIES],
    pub pcg: Vec<u8>,
    pub frm: Vec<u8>,
    pub refs: Vec<u8>,
}

/// Header of a bundle container, or the equivalent facts gathered from
/// separate-file sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub kind: BundleKind,
    pub ref_count: u32,
    pub frm_bytes: u32,
    pub pcg_tiles: u32,
    pub ref_offset: u32,
    pub frm_offset: u32,
    pub pcg_offset: u32,
    pub palette: [u16; PALETTE_ENTRIES],
}

impl ContainerHeader {
    pub fn ref_bytes(&self) -> usize {
        self.ref_count as usize * REF_RECORD_BYTES
    }

    pub fn pcg_bytes(&self) -> usize {
        self.pcg_tiles as usize * TILE_BYTES
    }

    pub fn to_bytes(&self) -> [u8; CONTAINER_HEADER_BYTES] {
        let mut out = [0u8; CONTAINER_HEADER_BYTES];
        out[0..4].copy_from_slice(CONTAINER_MAGIC);
        out[4..6].copy_from_slice(&CONTAINER_VERSION.to_be_bytes());
        out[6..8].copy_from_slice(&self.kind.code().to_be_bytes());
        let words = [
            self.ref_count,
            self.frm_bytes,
            self.pcg_tiles,
            self.ref_offset,
            self.frm_offset,
            self.pcg_offset,
        ];
        for (i, w) in words.iter().enumerate() {
            out[8 + i * 4..12 + i * 4].copy_from_slice(&w.to_be_bytes());
        }
        for (i, c) in self.palette.iter().enumerate() {
            out[32 + i * 2..34 + i * 2].copy_from_slice(&c.to_be_bytes());
        }
        out
    }

    /// Parse and sanity-check a header. `path` is only used for messages.
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < CONTAINER_HEADER_BYTES || &bytes[0..4] != CONTAINER_MAGIC {
            return Err(Error::validation(path, "not a bundle container"));
        }
        let u16_at = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let version = u16_at(4);
        if version != CONTAINER_VERSION {
            return Err(Error::validation(path, format!("unsupported container version {}", version)));
        }
        let kind = BundleKind::from_code(u16_at(6))
            .ok_or_else(|| Error::validation(path, format!("unknown bundle kind {}", u16_at(6))))?;

        let mut palette = [0u16; PALETTE_ENTRIES];
        for (i, slot) in palette.iter_mut().enumerate() {
            *slot = u16_at(32 + i * 2);
        }
        let header = Self {
            kind,
            ref_count: u32_at(8),
            frm_bytes: u32_at(12),
            pcg_tiles: u32_at(16),
            ref_offset: u32_at(20),
            frm_offset: u32_at(24),
            pcg_offset: u32_at(28),
            palette,
        };
        if header.frm_bytes as usize % FRM_RECORD_BYTES != 0 {
            return Err(Error::validation(
                path,
                format!("FRM section of {} bytes is not a multiple of {}", header.frm_bytes, FRM_RECORD_BYTES),
            ));
        }
        if kind == BundleKind::SinglePattern && (header.ref_count != 0 || header.frm_bytes != 0) {
            return Err(Error::validation(path, "single-pattern container carries FRM/REF data"));
        }
        Ok(header)
    }

    /// Check that every section the header describes lies inside a file of
    /// `file_len` bytes.
    pub fn check_extent(&self, file_len: u64, path: &Path) -> Result<()> {
        for (name, offset, len) in [
            ("REF", self.ref_offset, self.ref_count as u64 * REF_RECORD_BYTES as u64),
            ("FRM", self.frm_offset, self.frm_bytes as u64),
            ("PCG", self.pcg_offset, self.pcg_tiles as u64 * TILE_BYTES as u64),
        ] {
            let end = offset as u64 + len;
            if end > file_len {
                return Err(Error::validation(
                    path,
                    format!("{} section ends at byte {} of a {}-byte file", name, end, file_len),
                ));
            }
        }
        Ok(())
    }
}

impl Bundle {
    pub fn new(kind: BundleKind) -> Self {
        Self { kind, palette: [0; PALETTE_ENTRIES], pcg: Vec::new(), frm: Vec::new(), refs: Vec::new() }
    }

    pub fn tile_count(&self) -> usize {
        self.pcg.len() / TILE_BYTES
    }

    pub fn frame_count(&self) -> usize {
        self.frm.len() / FRM_RECORD_BYTES
    }

    pub fn sprite_count(&self) -> usize {
        self.refs.len() / REF_RECORD_BYTES
    }

    pub fn frames(&self) -> impl Iterator<Item = FrameRecord> + '_ {
        decode_frames(&self.frm)
    }

    pub fn references(&self) -> impl Iterator<Item = ReferenceRecord> + '_ {
        decode_refs(&self.refs)
    }

    /// Frame records belonging to composite sprite `sprite`.
    pub fn sprite_frames(&self, sprite: usize) -> Option<Vec<FrameRecord>> {
        let r = self.references().nth(sprite)?;
        let bytes = self.frm.get(r.frame_range())?;
        Some(decode_frames(bytes).collect())
    }

    /// Header describing this bundle as a container.
    pub fn header(&self) -> ContainerHeader {
        let ref_offset = CONTAINER_HEADER_BYTES as u32;
        let frm_offset = ref_offset + self.refs.len() as u32;
        let pcg_offset = frm_offset + self.frm.len() as u32;
        ContainerHeader {
            kind: self.kind,
            ref_count: self.sprite_count() as u32,
            frm_bytes: self.frm.len() as u32,
            pcg_tiles: self.tile_count() as u32,
            ref_offset,
            frm_offset,
            pcg_offset,
            palette: self.palette,
        }
    }

    /// Serialize as a single container image.
    pub fn to_container_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTAINER_HEADER_BYTES + self.refs.len() + self.frm.len() + self.pcg.len());
        out.extend_from_slice(&self.header().to_bytes());
        out.extend_from_slice(&self.refs);
        out.extend_from_slice(&self.frm);
        out.extend_from_slice(&self.pcg);
        out
    }

    /// Parse a container image held in memory.
    pub fn from_container_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let header = ContainerHeader::parse(bytes, path)?;
        header.check_extent(bytes.len() as u64, path)?;
        let section = |offset: u32, len: usize, name: &str| -> Result<Vec<u8>> {
            let start = offset as usize;
            bytes
                .get(start..start + len)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| Error::validation(path, format!("{} section runs past end of file", name)))
        };
        Ok(Self {
            kind: header.kind,
            palette: header.palette,
            refs: section(header.ref_offset, header.ref_bytes(), "REF")?,
            frm: section(header.frm_offset, header.frm_bytes as usize, "FRM")?,
            pcg: section(header.pcg_offset, header.pcg_bytes(), "PCG")?,
        })
    }

    /// Write the bundle next to `base`, returning the paths written.
    ///
    /// Parent directories are created as needed.
    pub fn write(&self, base: &Path, format: BundleFormat) -> Result<Vec<PathBuf>> {
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let mut written = Vec::new();
        match format {
            BundleFormat::Container => {
                let path = with_extension(base, EXT_CONTAINER);
                write_file(&path, &self.to_container_bytes())?;
                written.push(path);
            }
            BundleFormat::Separate => {
                let pcg_path = with_extension(base, self.kind.pcg_extension());
                write_file(&pcg_path, &self.pcg)?;
                written.push(pcg_path);
                if self.kind == BundleKind::Composite {
                    for (ext, data) in [(EXT_FRM, &self.frm), (EXT_REF, &self.refs)] {
                        let path = with_extension(base, ext);
                        write_file(&path, data)?;
                        written.push(path);
                    }
                }
            }
        }
        Ok(written)
    }

    /// Read a bundle from a `.xsb` path or from a separate-file base path.
    pub fn read(path: &Path) -> Result<Self> {
        if is_container_path(path) {
            let bytes = read_file(path)?;
            return Self::from_container_bytes(&bytes, path);
        }

        let ref_path = with_extension(path, EXT_REF);
        if ref_path.exists() {
            let refs = read_file(&ref_path)?;
            let frm = read_file(&with_extension(path, EXT_FRM))?;
            let pcg = read_file(&with_extension(path, EXT_COMPOSITE_PCG))?;
            check_multiple(&ref_path, refs.len(), REF_RECORD_BYTES)?;
            check_multiple(&with_extension(path, EXT_FRM), frm.len(), FRM_RECORD_BYTES)?;
            check_multiple(&with_extension(path, EXT_COMPOSITE_PCG), pcg.len(), TILE_BYTES)?;
            return Ok(Self { kind: BundleKind::Composite, palette: [0; PALETTE_ENTRIES], pcg, frm, refs });
        }

        let sp_path = with_extension(path, EXT_SINGLE_PCG);
        let pcg = read_file(&sp_path)?;
        check_multiple(&sp_path, pcg.len(), TILE_BYTES)?;
        Ok(Self { kind: BundleKind::SinglePattern, palette: [0; PALETTE_ENTRIES], pcg, frm: Vec::new(), refs: Vec::new() })
    }
}

/// True if `path` names a container rather than a separate-file base.
pub fn is_container_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(EXT_CONTAINER)
}

/// Append an extension to a base path without replacing any existing one,
/// so `out/player.v2` becomes `out/player.v2.frm`.
pub fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

pub(crate) fn check_multiple(path: &Path, len: usize, unit: usize) -> Result<()> {
    if len % unit != 0 {
        return Err(Error::validation(path, format!("size {} is not a multiple of {}", len, unit)));
    }
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data).map_err(|e| Error::io(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))?;
    log::debug!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_composite() -> Bundle {
        let mut b = Bundle::new(BundleKind::Composite);
        b.pcg = vec![0x11; TILE_BYTES * 2];
        b.frm.extend_from_slice(&FrameRecord::new(-8, -8, 0).to_bytes());
        b.frm.extend_from_slice(&FrameRecord::new(16, 0, 1).to_bytes());
        b.refs.extend_from_slice(&ReferenceRecord::new(2, 0).to_bytes());
        b.palette[1] = 0x07C0;
        b
    }

    #[test]
    fn test_with_extension_keeps_dots() {
        assert_eq!(with_extension(Path::new("out/hero.v2"), "frm"), PathBuf::from("out/hero.v2.frm"));
    }

    #[test]
    fn test_container_header_offsets() {
        let b = sample_composite();
        let h = b.header();
        assert_eq!(h.ref_offset, 64);
        assert_eq!(h.frm_offset, 72);
        assert_eq!(h.pcg_offset, 88);
        assert_eq!(h.ref_count, 1);
        assert_eq!(h.pcg_tiles, 2);
        let bytes = b.to_container_bytes();
        assert_eq!(&bytes[0..4], b"XSPB");
        assert_eq!(&bytes[6..8], &[0, 1]);
        assert_eq!(&bytes[34..36], &[0x07, 0xC0]);
        assert_eq!(bytes.len(), 64 + 8 + 16 + 256);
    }

    #[test]
    fn test_container_parse_matches_source() {
        let b = sample_composite();
        let parsed = Bundle::from_container_bytes(&b.to_container_bytes(), Path::new("x.xsb")).unwrap();
        assert_eq!(parsed, b);
        assert_eq!(parsed.sprite_frames(0).unwrap().len(), 2);
    }

    #[test]
    fn test_truncated_container_rejected() {
        let bytes = sample_composite().to_container_bytes();
        let err = Bundle::from_container_bytes(&bytes[..100], Path::new("x.xsb")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample_composite().to_container_bytes();
        bytes[0] = b'Q';
        assert!(ContainerHeader::parse(&bytes, Path::new("x.xsb")).is_err());
    }

    #[test]
    fn test_separate_files_written() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested").join("hero");
        let paths = sample_composite().write(&base, BundleFormat::Separate).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(fs::read(with_extension(&base, "xsp")).unwrap().len(), 256);
        assert_eq!(fs::read(with_extension(&base, "frm")).unwrap().len(), 16);
        assert_eq!(fs::read(with_extension(&base, "ref")).unwrap().len(), 8);

        let back = Bundle::read(&base).unwrap();
        assert_eq!(back.kind, BundleKind::Composite);
        assert_eq!(back.frm, sample_composite().frm);
    }

    #[test]
    fn test_single_pattern_writes_only_pcg() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("font");
        let mut b = Bundle::new(BundleKind::SinglePattern);
        b.pcg = vec![0; TILE_BYTES];
        let paths = b.write(&base, BundleFormat::Separate).unwrap();
        assert_eq!(paths, vec![with_extension(&base, "sp")]);
        assert!(!with_extension(&base, "frm").exists());
        assert_eq!(Bundle::read(&base).unwrap().kind, BundleKind::SinglePattern);
    }

    #[test]
    fn test_read_rejects_odd_sizes() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("bad");
        fs::write(with_extension(&base, "sp"), [0u8; 100]).unwrap();
        assert!(matches!(Bundle::read(&base), Err(Error::Validation { .. })));
    }
}
