//! EXIF tag model over raw TIFF blocks.
//!
//! Every container this crate understands stores EXIF the same way: a TIFF
//! header followed by IFDs. JPEG wraps it in an APP1 segment behind
//! `Exif\0\0`, PNG puts it in an `eXIf` chunk, and HEIF stores it as an
//! `Exif` item with a 4-byte offset prefix.
//!
//! [`ExifTags::parse`] flattens IFD0 together with the Exif, GPS and
//! Interoperability sub-IFDs into one ordered map; the pointer tags that link
//! them are structural and never appear in the map. IFD1 (the embedded
//! thumbnail) is ignored. [`ExifTags::to_tiff`] writes a little-endian block
//! with a single IFD.
//!
//! Only what stripping needs is modelled. Preserving metadata never goes
//! through this module: the original bytes are copied untouched.

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Orientation (0x0112). The one tag that survives stripping.
pub const ORIENTATION: u16 = 274;

const EXIF_IFD_POINTER: u16 = 0x8769;
const GPS_IFD_POINTER: u16 = 0x8825;
const INTEROP_IFD_POINTER: u16 = 0xA005;

/// IFD0 → Exif/GPS → Interop is two levels; anything past this is malformed.
const MAX_IFD_DEPTH: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExifError {
    #[error("TIFF header not recognised")]
    BadHeader,
    #[error("TIFF block truncated at byte {0}")]
    Truncated(usize),
    #[error("IFDs nested deeper than {MAX_IFD_DEPTH} levels")]
    TooDeep,
}

/// A decoded tag value, normalized to host integers.
///
/// Field types without a dedicated variant (SBYTE, SSHORT, FLOAT, DOUBLE)
/// are kept as raw little-endian units in [`TagValue::Raw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    Undefined(Vec<u8>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Raw { field_type: u16, data: Vec<u8> },
}

impl TagValue {
    /// Field type, component count and little-endian value bytes.
    fn encode(&self) -> (u16, usize, Vec<u8>) {
        match self {
            TagValue::Byte(v) => (1, v.len(), v.clone()),
            TagValue::Ascii(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                (2, bytes.len(), bytes)
            }
            TagValue::Short(v) => (3, v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            TagValue::Long(v) => (4, v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            TagValue::Rational(v) => (
                5,
                v.len(),
                v.iter()
                    .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
                    .collect(),
            ),
            TagValue::Undefined(v) => (7, v.len(), v.clone()),
            TagValue::SLong(v) => (9, v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect()),
            TagValue::SRational(v) => (
                10,
                v.len(),
                v.iter()
                    .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
                    .collect(),
            ),
            TagValue::Raw { field_type, data } => {
                let unit = unit_size(*field_type).unwrap_or(1);
                (*field_type, data.len() / unit, data.clone())
            }
        }
    }
}

/// Size in bytes of one component of a TIFF field type.
fn unit_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 | 13 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

/// Flattened EXIF tag set, ordered by tag id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifTags {
    entries: BTreeMap<u16, TagValue>,
}

impl ExifTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TIFF block (starting at the `II`/`MM` byte-order mark).
    pub fn parse(tiff: &[u8]) -> Result<Self, ExifError> {
        let endian = match tiff.get(0..4) {
            Some([b'I', b'I', 0x2A, 0x00]) => Endian::Little,
            Some([b'M', b'M', 0x00, 0x2A]) => Endian::Big,
            _ => return Err(ExifError::BadHeader),
        };
        let reader = TiffReader { data: tiff, endian };
        let ifd0 = reader.u32(4)? as usize;

        let mut tags = Self::new();
        let mut visited = HashSet::new();
        reader.read_ifd(ifd0, 0, &mut tags.entries, &mut visited)?;
        Ok(tags)
    }

    pub fn insert(&mut self, tag: u16, value: TagValue) {
        self.entries.insert(tag, value);
    }

    pub fn get(&self, tag: u16) -> Option<&TagValue> {
        self.entries.get(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tag_ids(&self) -> Vec<u16> {
        self.entries.keys().copied().collect()
    }

    /// The orientation value (1–8) if the tag is present as a SHORT.
    pub fn orientation(&self) -> Option<u16> {
        match self.get(ORIENTATION) {
            Some(TagValue::Short(values)) => values.first().copied(),
            _ => None,
        }
    }

    /// Drop every tag except orientation.
    pub fn retain_orientation(&mut self) {
        self.entries.retain(|tag, _| *tag == ORIENTATION);
    }

    /// Serialize as a little-endian TIFF block with a single IFD.
    pub fn to_tiff(&self) -> Vec<u8> {
        let ifd_len = 2 + self.entries.len() * 12 + 4;
        let data_start = 8 + ifd_len;

        let mut out = Vec::with_capacity(data_start);
        out.extend_from_slice(b"II\x2A\x00");
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());

        let mut data_area = Vec::new();
        for (tag, value) in &self.entries {
            let (field_type, count, bytes) = value.encode();
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&field_type.to_le_bytes());
            out.extend_from_slice(&(count as u32).to_le_bytes());
            if bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                out.extend_from_slice(&inline);
            } else {
                let offset = data_start + data_area.len();
                out.extend_from_slice(&(offset as u32).to_le_bytes());
                data_area.extend_from_slice(&bytes);
                // Values start on word boundaries
                if data_area.len() % 2 == 1 {
                    data_area.push(0);
                }
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&data_area);
        out
    }
}

/// Reduce a TIFF block to its orientation tag.
///
/// Returns `None` when nothing is left to keep, including when the block
/// cannot be parsed at all: unreadable metadata is dropped, not carried.
pub fn orientation_only(tiff: &[u8]) -> Option<Vec<u8>> {
    let mut tags = ExifTags::parse(tiff).ok()?;
    tags.retain_orientation();
    (!tags.is_empty()).then(|| tags.to_tiff())
}

/// Rewrite a block so its orientation reads upright (1), keeping every other tag.
///
/// Used when the decoder has already rotated the pixels. Returns `None` when
/// the block is already upright or cannot be parsed.
pub fn with_upright_orientation(tiff: &[u8]) -> Option<Vec<u8>> {
    let mut tags = ExifTags::parse(tiff).ok()?;
    match tags.orientation() {
        Some(value) if value != 1 => {
            tags.insert(ORIENTATION, TagValue::Short(vec![1]));
            Some(tags.to_tiff())
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        let bytes = [b[0], b[1]];
        match self {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let bytes = [b[0], b[1], b[2], b[3]];
        match self {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        }
    }
}

struct TiffReader<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl TiffReader<'_> {
    fn slice(&self, at: usize, len: usize) -> Result<&[u8], ExifError> {
        at.checked_add(len)
            .and_then(|end| self.data.get(at..end))
            .ok_or(ExifError::Truncated(at))
    }

    fn u16(&self, at: usize) -> Result<u16, ExifError> {
        Ok(self.endian.u16(self.slice(at, 2)?))
    }

    fn u32(&self, at: usize) -> Result<u32, ExifError> {
        Ok(self.endian.u32(self.slice(at, 4)?))
    }

    fn read_ifd(
        &self,
        offset: usize,
        depth: usize,
        tags: &mut BTreeMap<u16, TagValue>,
        visited: &mut HashSet<usize>,
    ) -> Result<(), ExifError> {
        // Malformed files can point IFDs at each other
        if !visited.insert(offset) {
            return Ok(());
        }

        let count = self.u16(offset)? as usize;
        for i in 0..count {
            let entry = offset + 2 + i * 12;
            let tag = self.u16(entry)?;
            let field_type = self.u16(entry + 2)?;
            let components = self.u32(entry + 4)? as usize;

            if matches!(tag, EXIF_IFD_POINTER | GPS_IFD_POINTER | INTEROP_IFD_POINTER) {
                if depth >= MAX_IFD_DEPTH {
                    return Err(ExifError::TooDeep);
                }
                let sub_ifd = self.u32(entry + 8)? as usize;
                self.read_ifd(sub_ifd, depth + 1, tags, visited)?;
                continue;
            }

            let Some(unit) = unit_size(field_type) else {
                continue;
            };
            let len = unit
                .checked_mul(components)
                .ok_or(ExifError::Truncated(entry))?;
            let value_at = if len <= 4 {
                entry + 8
            } else {
                self.u32(entry + 8)? as usize
            };
            let raw = self.slice(value_at, len)?;
            tags.entry(tag).or_insert_with(|| self.decode(field_type, raw));
        }
        Ok(())
    }

    fn decode(&self, field_type: u16, raw: &[u8]) -> TagValue {
        let e = self.endian;
        match field_type {
            1 => TagValue::Byte(raw.to_vec()),
            2 => TagValue::Ascii(
                String::from_utf8_lossy(raw)
                    .trim_end_matches('\0')
                    .to_string(),
            ),
            3 => TagValue::Short(raw.chunks_exact(2).map(|c| e.u16(c)).collect()),
            4 => TagValue::Long(raw.chunks_exact(4).map(|c| e.u32(c)).collect()),
            5 => TagValue::Rational(
                raw.chunks_exact(8)
                    .map(|c| (e.u32(&c[..4]), e.u32(&c[4..])))
                    .collect(),
            ),
            7 => TagValue::Undefined(raw.to_vec()),
            9 => TagValue::SLong(raw.chunks_exact(4).map(|c| e.u32(c) as i32).collect()),
            10 => TagValue::SRational(
                raw.chunks_exact(8)
                    .map(|c| (e.u32(&c[..4]) as i32, e.u32(&c[4..]) as i32))
                    .collect(),
            ),
            _ => {
                let unit = unit_size(field_type).unwrap_or(1);
                let mut data = raw.to_vec();
                if let Endian::Big = e {
                    for chunk in data.chunks_exact_mut(unit) {
                        chunk.reverse();
                    }
                }
                TagValue::Raw { field_type, data }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_exif;

    /// Big-endian block: IFD0 { Orientation=6, ExifIFD -> { DateTimeOriginal } }.
    fn big_endian_block() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"MM\x00\x2A");
        b.extend_from_slice(&8u32.to_be_bytes());
        // IFD0 at 8: two entries
        b.extend_from_slice(&2u16.to_be_bytes());
        b.extend_from_slice(&ORIENTATION.to_be_bytes());
        b.extend_from_slice(&3u16.to_be_bytes());
        b.extend_from_slice(&1u32.to_be_bytes());
        b.extend_from_slice(&[0x00, 0x06, 0x00, 0x00]);
        b.extend_from_slice(&EXIF_IFD_POINTER.to_be_bytes());
        b.extend_from_slice(&4u16.to_be_bytes());
        b.extend_from_slice(&1u32.to_be_bytes());
        b.extend_from_slice(&38u32.to_be_bytes());
        b.extend_from_slice(&0u32.to_be_bytes());
        // Exif IFD at 38: one ASCII entry pointing at 56
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&36867u16.to_be_bytes());
        b.extend_from_slice(&2u16.to_be_bytes());
        b.extend_from_slice(&20u32.to_be_bytes());
        b.extend_from_slice(&56u32.to_be_bytes());
        b.extend_from_slice(&0u32.to_be_bytes());
        b.extend_from_slice(b"2024:05:01 10:00:00\0");
        b
    }

    #[test]
    fn parses_big_endian_and_flattens_sub_ifd() {
        let tags = ExifTags::parse(&big_endian_block()).unwrap();

        assert_eq!(tags.tag_ids(), vec![ORIENTATION, 36867]);
        assert_eq!(tags.orientation(), Some(6));
        assert_eq!(
            tags.get(36867),
            Some(&TagValue::Ascii("2024:05:01 10:00:00".into()))
        );
    }

    #[test]
    fn to_tiff_round_trips_through_parse() {
        let tags = sample_exif();
        let reparsed = ExifTags::parse(&tags.to_tiff()).unwrap();
        assert_eq!(reparsed, tags);
    }

    #[test]
    fn round_trips_rationals_and_raw_types() {
        let mut tags = ExifTags::new();
        tags.insert(282, TagValue::Rational(vec![(72, 1)]));
        tags.insert(37377, TagValue::SRational(vec![(-3, 2)]));
        tags.insert(
            41991,
            TagValue::Raw {
                field_type: 8,
                data: vec![0xFE, 0xFF],
            },
        );

        assert_eq!(ExifTags::parse(&tags.to_tiff()).unwrap(), tags);
    }

    #[test]
    fn retain_orientation_keeps_only_tag_274() {
        let mut tags = sample_exif();
        tags.retain_orientation();
        assert_eq!(tags.tag_ids(), vec![ORIENTATION]);
        assert_eq!(tags.get(ORIENTATION), Some(&TagValue::Short(vec![1])));
    }

    #[test]
    fn orientation_only_drops_blocks_without_orientation() {
        let mut tags = ExifTags::new();
        tags.insert(306, TagValue::Ascii("2024".into()));
        assert_eq!(orientation_only(&tags.to_tiff()), None);
    }

    #[test]
    fn orientation_only_drops_unparseable_blocks() {
        assert_eq!(orientation_only(b"not a tiff block"), None);
    }

    #[test]
    fn orientation_only_block_is_minimal() {
        let tiff = orientation_only(&sample_exif().to_tiff()).unwrap();
        // header + count + one entry + next-IFD pointer
        assert_eq!(tiff.len(), 8 + 2 + 12 + 4);
    }

    #[test]
    fn rejects_unknown_header() {
        assert_eq!(ExifTags::parse(b"XX\x2A\x00"), Err(ExifError::BadHeader));
    }

    #[test]
    fn truncated_ifd_is_an_error() {
        let mut block = sample_exif().to_tiff();
        block.truncate(12);
        assert!(matches!(
            ExifTags::parse(&block),
            Err(ExifError::Truncated(_))
        ));
    }

    #[test]
    fn upright_orientation_keeps_other_tags() {
        let mut tags = sample_exif();
        tags.insert(ORIENTATION, TagValue::Short(vec![6]));

        let rewritten =
            ExifTags::parse(&with_upright_orientation(&tags.to_tiff()).unwrap()).unwrap();

        assert_eq!(rewritten.orientation(), Some(1));
        assert_eq!(rewritten.tag_ids(), sample_exif().tag_ids());
        assert_eq!(with_upright_orientation(&sample_exif().to_tiff()), None);
    }

    #[test]
    fn long_chain_of_sub_ifds_is_rejected() {
        const IFD_LEN: usize = 2 + 12 + 4;
        let mut b = Vec::new();
        b.extend_from_slice(b"II\x2A\x00");
        b.extend_from_slice(&8u32.to_le_bytes());
        for i in 0..64 {
            let next = 8 + IFD_LEN * (i + 1);
            b.extend_from_slice(&1u16.to_le_bytes());
            b.extend_from_slice(&EXIF_IFD_POINTER.to_le_bytes());
            b.extend_from_slice(&4u16.to_le_bytes());
            b.extend_from_slice(&1u32.to_le_bytes());
            b.extend_from_slice(&(next as u32).to_le_bytes());
            b.extend_from_slice(&0u32.to_le_bytes());
        }

        assert_eq!(ExifTags::parse(&b), Err(ExifError::TooDeep));
        assert_eq!(orientation_only(&b), None);
    }

    #[test]
    fn self_referencing_ifd_terminates() {
        let mut b = Vec::new();
        b.extend_from_slice(b"II\x2A\x00");
        b.extend_from_slice(&8u32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&EXIF_IFD_POINTER.to_le_bytes());
        b.extend_from_slice(&4u16.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&8u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());

        assert!(ExifTags::parse(&b).unwrap().is_empty());
    }
}
