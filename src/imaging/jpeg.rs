//! JPEG marker-segment container.
//!
//! A JPEG file is split into three parts:
//!
//! ```text
//! FFD8 | header segments (APPn, COM, DQT, SOF, DHT, ...) | scan data .. FFD9 | trailer
//! ```
//!
//! Header segments are kept as `(marker, payload)` pairs so metadata can be
//! dropped or replaced without touching the compressed image. The scan data
//! runs from the first SOS marker through EOI and is carried as opaque
//! bytes. The trailer is whatever follows EOI: MPF secondary images, depth
//! maps, or padding.
//!
//! Segment classification:
//!
//! | Kind | Segments |
//! |---|---|
//! | `Exif` | APP1 `Exif\0\0` |
//! | `Xmp` | APP1 `http://ns.adobe.com/xap/1.0/`, extended XMP |
//! | `Icc` | APP2 `ICC_PROFILE` |
//! | `Iptc` | APP13 (Photoshop IRB) |
//! | `Comment` | COM |
//! | `Vendor` | any other APPn (MPF, maker data, ...) |
//! | `Codec` | APP0 (JFIF), APP14 (Adobe), and all non-APP segments |

use super::backend::ContainerError;
use super::exif;

pub const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_HEADER: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// Largest payload a single marker segment can carry (length field is u16
/// and counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

const FORMAT: &str = "JPEG";

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const APP14: u8 = 0xEE;
const COM: u8 = 0xFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Codec,
    Exif,
    Xmp,
    Icc,
    Iptc,
    Comment,
    Vendor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub payload: Vec<u8>,
}

impl Segment {
    /// APP1 EXIF segment wrapping a TIFF block.
    pub fn exif(tiff: &[u8]) -> Self {
        let mut payload = EXIF_HEADER.to_vec();
        payload.extend_from_slice(tiff);
        Self {
            marker: APP1,
            payload,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        let p = &self.payload;
        match self.marker {
            APP1 if p.starts_with(EXIF_HEADER) => SegmentKind::Exif,
            APP1 if p.starts_with(XMP_HEADER) || p.starts_with(XMP_EXTENSION_HEADER) => {
                SegmentKind::Xmp
            }
            APP2 if p.starts_with(ICC_HEADER) => SegmentKind::Icc,
            APP13 => SegmentKind::Iptc,
            COM => SegmentKind::Comment,
            APP0 | APP14 => SegmentKind::Codec,
            0xE1..=0xEF => SegmentKind::Vendor,
            _ => SegmentKind::Codec,
        }
    }

    /// Whether the segment describes the photo rather than how to decode it.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self.kind(),
            SegmentKind::Exif
                | SegmentKind::Xmp
                | SegmentKind::Icc
                | SegmentKind::Iptc
                | SegmentKind::Comment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegFile {
    pub segments: Vec<Segment>,
    scan: Vec<u8>,
    trailer: Vec<u8>,
}

impl JpegFile {
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        if !data.starts_with(&[0xFF, SOI]) {
            return Err(ContainerError::Invalid {
                format: FORMAT,
                reason: "missing SOI marker".into(),
            });
        }

        let mut pos = 2;
        let mut segments = Vec::new();
        loop {
            let marker_start = pos;
            let marker = read_marker(data, &mut pos)?;
            match marker {
                SOS => {
                    let end = find_end_of_image(data, marker_start)?;
                    return Ok(Self {
                        segments,
                        scan: data[marker_start..end].to_vec(),
                        trailer: data[end..].to_vec(),
                    });
                }
                EOI => {
                    return Err(ContainerError::Invalid {
                        format: FORMAT,
                        reason: "EOI before first scan".into(),
                    });
                }
                0x01 | 0xD0..=0xD7 => {}
                _ => {
                    let len = read_length(data, pos)?;
                    segments.push(Segment {
                        marker,
                        payload: data[pos + 2..pos + len].to_vec(),
                    });
                    pos += len;
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let header_len: usize = self.segments.iter().map(|s| s.payload.len() + 4).sum();
        let mut out = Vec::with_capacity(2 + header_len + self.scan.len() + self.trailer.len());
        out.extend_from_slice(&[0xFF, SOI]);
        for segment in &self.segments {
            if segment.payload.len() > MAX_SEGMENT_PAYLOAD {
                return Err(ContainerError::Invalid {
                    format: FORMAT,
                    reason: format!(
                        "segment 0x{:02X} is {} bytes, over the {} byte limit",
                        segment.marker,
                        segment.payload.len(),
                        MAX_SEGMENT_PAYLOAD
                    ),
                });
            }
            out.extend_from_slice(&[0xFF, segment.marker]);
            out.extend_from_slice(&((segment.payload.len() + 2) as u16).to_be_bytes());
            out.extend_from_slice(&segment.payload);
        }
        out.extend_from_slice(&self.scan);
        out.extend_from_slice(&self.trailer);
        Ok(out)
    }

    /// TIFF block of the first EXIF segment.
    pub fn exif(&self) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|s| s.kind() == SegmentKind::Exif)
            .map(|s| &s.payload[EXIF_HEADER.len()..])
    }

    /// Segments worth carrying onto a re-encoded stream.
    pub fn metadata_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_metadata())
    }

    /// Insert segments after the leading APP0 (JFIF) block, where readers
    /// expect EXIF to sit.
    pub fn insert_metadata(&mut self, segments: impl IntoIterator<Item = Segment>) {
        let at = self
            .segments
            .iter()
            .position(|s| s.marker != APP0)
            .unwrap_or(self.segments.len());
        self.segments.splice(at..at, segments);
    }

    /// Remove every identifying segment.
    ///
    /// EXIF is reduced to its orientation tag; XMP, IPTC, comments, vendor
    /// APPn segments and the trailer are dropped. ICC profiles and codec
    /// segments stay.
    pub fn strip_metadata(&mut self) {
        let mut exif_seen = false;
        let mut kept = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            match segment.kind() {
                SegmentKind::Codec | SegmentKind::Icc => kept.push(segment),
                SegmentKind::Exif if !exif_seen => {
                    exif_seen = true;
                    if let Some(tiff) = exif::orientation_only(&segment.payload[EXIF_HEADER.len()..])
                    {
                        kept.push(Segment::exif(&tiff));
                    }
                }
                _ => {}
            }
        }
        self.segments = kept;
        self.trailer.clear();
    }
}

/// Read a marker at `pos`, skipping fill bytes. Leaves `pos` after the marker.
fn read_marker(data: &[u8], pos: &mut usize) -> Result<u8, ContainerError> {
    if data.get(*pos) != Some(&0xFF) {
        return Err(ContainerError::Invalid {
            format: FORMAT,
            reason: format!("expected marker at byte {}", *pos),
        });
    }
    while data.get(*pos) == Some(&0xFF) {
        *pos += 1;
    }
    let marker = *data.get(*pos).ok_or(ContainerError::Truncated {
        format: FORMAT,
        offset: *pos,
    })?;
    *pos += 1;
    Ok(marker)
}

/// Segment length at `pos` (includes the two length bytes), bounds-checked.
fn read_length(data: &[u8], pos: usize) -> Result<usize, ContainerError> {
    let truncated = ContainerError::Truncated {
        format: FORMAT,
        offset: pos,
    };
    let bytes = data.get(pos..pos + 2).ok_or(truncated.clone())?;
    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if len < 2 {
        return Err(ContainerError::Invalid {
            format: FORMAT,
            reason: format!("segment length {len} at byte {pos}"),
        });
    }
    if pos + len > data.len() {
        return Err(truncated);
    }
    Ok(len)
}

/// Walk scans (and any tables between them) from the first SOS, returning
/// the index just past EOI. A stream that ends without EOI is accepted as
/// running to the end of the data.
fn find_end_of_image(data: &[u8], sos_start: usize) -> Result<usize, ContainerError> {
    let mut pos = sos_start;
    loop {
        let marker = read_marker(data, &mut pos)?;
        match marker {
            EOI => return Ok(pos),
            0x01 | 0xD0..=0xD7 => {}
            _ => {
                pos += read_length(data, pos)?;
                if marker == SOS {
                    match skip_entropy_coded(data, pos) {
                        Some(next) => pos = next,
                        None => return Ok(data.len()),
                    }
                }
            }
        }
    }
}

/// Index of the next real marker after entropy-coded data, or `None` if
/// the data runs out first.
fn skip_entropy_coded(data: &[u8], mut pos: usize) -> Option<usize> {
    while pos < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data.get(pos + 1)? {
            // Stuffed zero, restart markers and fill bytes are part of the scan
            0x00 | 0xD0..=0xD7 => pos += 2,
            0xFF => pos += 1,
            _ => return Some(pos),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::exif::{ExifTags, ORIENTATION, TagValue};
    use crate::test_helpers::{
        comment_segment, iptc_segment, jpeg_bytes, jpeg_with_segments, sample_exif, xmp_segment,
    };

    #[test]
    fn round_trips_encoder_output_byte_for_byte() {
        let bytes = jpeg_bytes(16, 16, 90);
        let file = JpegFile::parse(&bytes).unwrap();
        assert_eq!(file.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn rejects_non_jpeg() {
        assert!(matches!(
            JpegFile::parse(b"\x89PNG\r\n\x1a\n"),
            Err(ContainerError::Invalid { .. })
        ));
    }

    #[test]
    fn truncated_segment_is_reported() {
        let bytes = jpeg_bytes(16, 16, 90);
        assert!(matches!(
            JpegFile::parse(&bytes[..10]),
            Err(ContainerError::Truncated { .. })
        ));
    }

    #[test]
    fn classifies_segments() {
        assert_eq!(Segment::exif(b"II*\0").kind(), SegmentKind::Exif);
        assert_eq!(xmp_segment().kind(), SegmentKind::Xmp);
        assert_eq!(iptc_segment().kind(), SegmentKind::Iptc);
        assert_eq!(comment_segment().kind(), SegmentKind::Comment);
        let mpf = Segment {
            marker: APP2,
            payload: b"MPF\0data".to_vec(),
        };
        assert_eq!(mpf.kind(), SegmentKind::Vendor);
        assert!(!mpf.is_metadata());
    }

    #[test]
    fn insert_metadata_goes_after_jfif() {
        let mut file = JpegFile::parse(&jpeg_bytes(8, 8, 90)).unwrap();
        file.insert_metadata([Segment::exif(&sample_exif().to_tiff())]);

        let reparsed = JpegFile::parse(&file.to_bytes().unwrap()).unwrap();
        let first_non_app0 = reparsed
            .segments
            .iter()
            .find(|s| s.marker != APP0)
            .unwrap();
        assert_eq!(first_non_app0.kind(), SegmentKind::Exif);
        assert_eq!(
            ExifTags::parse(reparsed.exif().unwrap()).unwrap(),
            sample_exif()
        );
    }

    #[test]
    fn strip_keeps_only_orientation_and_codec_segments() {
        let bytes = jpeg_with_segments(
            &jpeg_bytes(8, 8, 90),
            vec![
                Segment::exif(&sample_exif().to_tiff()),
                xmp_segment(),
                iptc_segment(),
                comment_segment(),
            ],
        );
        let mut file = JpegFile::parse(&bytes).unwrap();

        file.strip_metadata();

        let kinds: Vec<SegmentKind> = file.segments.iter().map(|s| s.kind()).collect();
        assert!(!kinds.contains(&SegmentKind::Xmp));
        assert!(!kinds.contains(&SegmentKind::Iptc));
        assert!(!kinds.contains(&SegmentKind::Comment));
        let tags = ExifTags::parse(file.exif().unwrap()).unwrap();
        assert_eq!(tags.tag_ids(), vec![ORIENTATION]);
        assert_eq!(tags.get(ORIENTATION), Some(&TagValue::Short(vec![1])));
    }

    #[test]
    fn strip_removes_exif_without_orientation() {
        let mut tags = ExifTags::new();
        tags.insert(306, TagValue::Ascii("2024".into()));
        let bytes = jpeg_with_segments(&jpeg_bytes(8, 8, 90), vec![Segment::exif(&tags.to_tiff())]);
        let mut file = JpegFile::parse(&bytes).unwrap();

        file.strip_metadata();

        assert!(file.exif().is_none());
    }

    #[test]
    fn strip_drops_trailer() {
        let mut bytes = jpeg_bytes(8, 8, 90);
        bytes.extend_from_slice(b"secondary image data");
        let mut file = JpegFile::parse(&bytes).unwrap();
        assert_eq!(file.trailer, b"secondary image data");

        file.strip_metadata();

        assert!(file.trailer.is_empty());
        assert!(file.to_bytes().unwrap().ends_with(&[0xFF, EOI]));
    }

    #[test]
    fn stripped_stream_still_decodes() {
        let bytes = jpeg_with_segments(
            &jpeg_bytes(8, 8, 90),
            vec![Segment::exif(&sample_exif().to_tiff()), xmp_segment()],
        );
        let mut file = JpegFile::parse(&bytes).unwrap();
        file.strip_metadata();

        let img = image::load_from_memory_with_format(
            &file.to_bytes().unwrap(),
            image::ImageFormat::Jpeg,
        )
        .unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn oversized_segment_fails_to_serialize() {
        let mut file = JpegFile::parse(&jpeg_bytes(8, 8, 90)).unwrap();
        file.insert_metadata([Segment {
            marker: COM,
            payload: vec![b'x'; MAX_SEGMENT_PAYLOAD + 1],
        }]);
        assert!(matches!(
            file.to_bytes(),
            Err(ContainerError::Invalid { .. })
        ));
    }
}
