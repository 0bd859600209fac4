//! FRM and REF record layouts.
//!
//! Both records are 8 bytes, big-endian:
//!
//! | record | layout |
//! |--------|--------|
//! | FRM | `i16 rel_x`, `i16 rel_y`, `u16 pattern`, `u16 reflection` |
//! | REF | `u16 frame_count`, `u32 frame_offset`, `u16 reserved` |

use serde::Serialize;

/// Size of one FRM record in bytes.
pub const FRM_RECORD_BYTES: usize = 8;
/// Size of one REF record in bytes.
pub const REF_RECORD_BYTES: usize = 8;

/// Byte offset of the pattern field inside an FRM record.
pub(crate) const FRM_PATTERN_FIELD: usize = 4;
/// Byte offset of the frame-offset field inside a REF record.
pub(crate) const REF_OFFSET_FIELD: usize = 2;

/// One tile placement, relative to the previous placement of the same sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRecord {
    pub rel_x: i16,
    pub rel_y: i16,
    pub pattern: u16,
    pub reflection: u16,
}

impl FrameRecord {
    pub fn new(rel_x: i16, rel_y: i16, pattern: u16) -> Self {
        Self { rel_x, rel_y, pattern, reflection: 0 }
    }

    pub fn to_bytes(&self) -> [u8; FRM_RECORD_BYTES] {
        let mut out = [0; FRM_RECORD_BYTES];
        out[0..2].copy_from_slice(&self.rel_x.to_be_bytes());
        out[2..4].copy_from_slice(&self.rel_y.to_be_bytes());
        out[4..6].copy_from_slice(&self.pattern.to_be_bytes());
        out[6..8].copy_from_slice(&self.reflection.to_be_bytes());
        out
    }

    pub fn from_bytes(b: &[u8; FRM_RECORD_BYTES]) -> Self {
        Self {
            rel_x: i16::from_be_bytes([b[0], b[1]]),
            rel_y: i16::from_be_bytes([b[2], b[3]]),
            pattern: u16::from_be_bytes([b[4], b[5]]),
            reflection: u16::from_be_bytes([b[6], b[7]]),
        }
    }
}

/// Summary of one composite sprite: how many FRM records it owns and the
/// byte offset of the first one within the FRM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub frame_count: u16,
    pub frame_offset: u32,
    pub reserved: u16,
}

impl ReferenceRecord {
    pub fn new(frame_count: u16, frame_offset: u32) -> Self {
        Self { frame_count, frame_offset, reserved: 0 }
    }

    /// Byte range of this sprite's records within the FRM table.
    pub fn frame_range(&self) -> std::ops::Range<usize> {
        let start = self.frame_offset as usize;
        start..start + self.frame_count as usize * FRM_RECORD_BYTES
    }

    pub fn to_bytes(&self) -> [u8; REF_RECORD_BYTES] {
        let mut out = [0; REF_RECORD_BYTES];
        out[0..2].copy_from_slice(&self.frame_count.to_be_bytes());
        out[2..6].copy_from_slice(&self.frame_offset.to_be_bytes());
        out[6..8].copy_from_slice(&self.reserved.to_be_bytes());
        out
    }

    pub fn from_bytes(b: &[u8; REF_RECORD_BYTES]) -> Self {
        Self {
            frame_count: u16::from_be_bytes([b[0], b[1]]),
            frame_offset: u32::from_be_bytes([b[2], b[3], b[4], b[5]]),
            reserved: u16::from_be_bytes([b[6], b[7]]),
        }
    }
}

/// Decode every complete FRM record in `bytes`. A trailing partial record is
/// ignored.
pub fn decode_frames(bytes: &[u8]) -> impl Iterator<Item = FrameRecord> + '_ {
    bytes.chunks_exact(FRM_RECORD_BYTES).map(|c| {
        let arr: &[u8; FRM_RECORD_BYTES] = c.try_into().unwrap_or(&[0; FRM_RECORD_BYTES]);
        FrameRecord::from_bytes(arr)
    })
}

/// Decode every complete REF record in `bytes`.
pub fn decode_refs(bytes: &[u8]) -> impl Iterator<Item = ReferenceRecord> + '_ {
    bytes.chunks_exact(REF_RECORD_BYTES).map(|c| {
        let arr: &[u8; REF_RECORD_BYTES] = c.try_into().unwrap_or(&[0; REF_RECORD_BYTES]);
        ReferenceRecord::from_bytes(arr)
    })
}

/// Add `delta` to the big-endian u16 at `at`, wrapping on overflow.
pub(crate) fn add_be_u16(buf: &mut [u8], at: usize, delta: u16) {
    let v = u16::from_be_bytes([buf[at], buf[at + 1]]).wrapping_add(delta);
    buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
}

/// Add `delta` to the big-endian u32 at `at`, wrapping on overflow.
pub(crate) fn add_be_u32(buf: &mut [u8], at: usize, delta: u32) {
    let v = u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]).wrapping_add(delta);
    buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frm_wire_layout() {
        let rec = FrameRecord::new(-8, 16, 0x0102);
        assert_eq!(rec.to_bytes(), [0xFF, 0xF8, 0x00, 0x10, 0x01, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_ref_wire_layout() {
        let rec = ReferenceRecord::new(3, 0x0001_0020);
        assert_eq!(rec.to_bytes(), [0x00, 0x03, 0x00, 0x01, 0x00, 0x20, 0x00, 0x00]);
        assert_eq!(ReferenceRecord::from_bytes(&rec.to_bytes()), rec);
    }

    #[test]
    fn test_frame_range() {
        let rec = ReferenceRecord::new(2, 16);
        assert_eq!(rec.frame_range(), 16..32);
    }

    #[test]
    fn test_decode_skips_partial_tail() {
        let mut bytes = FrameRecord::new(1, 2, 3).to_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA; 5]);
        let recs: Vec<_> = decode_frames(&bytes).collect();
        assert_eq!(recs, vec![FrameRecord::new(1, 2, 3)]);
    }

    #[test]
    fn test_field_patch_helpers() {
        let mut frm = FrameRecord::new(0, 0, 2).to_bytes();
        add_be_u16(&mut frm, FRM_PATTERN_FIELD, 3);
        assert_eq!(FrameRecord::from_bytes(&frm).pattern, 5);

        let mut r = ReferenceRecord::new(1, 8).to_bytes();
        add_be_u32(&mut r, REF_OFFSET_FIELD, 0x1_0000);
        assert_eq!(ReferenceRecord::from_bytes(&r).frame_offset, 0x1_0008);
    }
}
