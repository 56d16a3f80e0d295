//! HEIF (ISO-BMFF) container: locating and blanking metadata items.
//!
//! HEIF stores EXIF and XMP as *items*. The `meta` box lists them:
//!
//! - `iinf` → `infe` entries give each item an id and type (`Exif`, or
//!   `mime` with content type `application/rdf+xml` for XMP)
//! - `iloc` maps item ids to byte extents, either absolute file offsets
//!   (construction method 0) or offsets into the `idat` box (method 1)
//!
//! No HEVC decoder is involved. Stripping overwrites the item bytes in
//! place, so no box sizes or offsets change:
//!
//! - EXIF: a 4-byte zero offset + orientation-only TIFF block, zero-padded
//! - XMP: an empty XMP packet, space-padded
//!
//! ```text
//! ftyp | meta { hdlr, pitm, iinf { infe.. }, iloc, iprp, idat? } | mdat
//! ```

use super::backend::ContainerError;
use super::exif::ExifTags;
use std::ops::Range;

const FORMAT: &str = "HEIF";

/// Major/compatible brands identifying still-image HEIF files.
pub const BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
];

const XMP_CONTENT_TYPE: &str = "application/rdf+xml";

const EMPTY_XMP_PACKET: &[u8] = "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\
<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/><?xpacket end=\"w\"?>"
    .as_bytes();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Exif,
    Xmp,
}

/// A metadata item and the absolute file ranges holding its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    pub id: u32,
    pub kind: ItemKind,
    pub extents: Vec<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeifFile {
    data: Vec<u8>,
    items: Vec<MetadataItem>,
}

impl HeifFile {
    pub fn parse(data: Vec<u8>) -> Result<Self, ContainerError> {
        let top = boxes(&data, 0..data.len())?;
        match top.first() {
            Some(b) if &b.kind == b"ftyp" => {}
            _ => {
                return Err(ContainerError::Invalid {
                    format: FORMAT,
                    reason: "file does not start with ftyp".into(),
                });
            }
        }

        let items = match top.iter().find(|b| &b.kind == b"meta") {
            Some(meta) => parse_meta(&data, meta)?,
            None => Vec::new(),
        };
        Ok(Self { data, items })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// TIFF block of the first EXIF item (after its header-offset prefix).
    pub fn exif(&self) -> Option<Vec<u8>> {
        let item = self.items.iter().find(|i| i.kind == ItemKind::Exif)?;
        let payload = self.item_bytes(item);
        let offset = u32::from_be_bytes(payload.get(0..4)?.try_into().ok()?) as usize;
        payload.get(4 + offset..).map(<[u8]>::to_vec)
    }

    /// Blank XMP items and reduce EXIF items to their orientation tag.
    pub fn strip_metadata(&mut self) {
        for item in self.items.clone() {
            let capacity: usize = item.extents.iter().map(|r| r.len()).sum();
            let (replacement, pad) = match item.kind {
                ItemKind::Exif => (self.orientation_payload(&item), 0u8),
                ItemKind::Xmp => (EMPTY_XMP_PACKET.to_vec(), b' '),
            };
            let replacement = if replacement.len() <= capacity {
                replacement
            } else {
                Vec::new()
            };
            self.overwrite(&item.extents, &replacement, pad);
        }
    }

    fn orientation_payload(&self, item: &MetadataItem) -> Vec<u8> {
        let payload = self.item_bytes(item);
        let mut tags = payload
            .get(0..4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .and_then(|offset| payload.get(4 + offset..))
            .and_then(|tiff| ExifTags::parse(tiff).ok())
            .unwrap_or_default();
        tags.retain_orientation();

        let mut out = 0u32.to_be_bytes().to_vec();
        out.extend_from_slice(&tags.to_tiff());
        out
    }

    fn item_bytes(&self, item: &MetadataItem) -> Vec<u8> {
        item.extents
            .iter()
            .flat_map(|r| self.data[r.clone()].iter().copied())
            .collect()
    }

    /// Write `bytes` across the extents, filling what is left with `pad`.
    fn overwrite(&mut self, extents: &[Range<usize>], bytes: &[u8], pad: u8) {
        let mut source = bytes.iter().copied();
        for range in extents {
            for slot in &mut self.data[range.clone()] {
                *slot = source.next().unwrap_or(pad);
            }
        }
    }
}

/// Whether an `ftyp` box at the start of `data` names a HEIF brand.
pub fn has_heif_brand(data: &[u8]) -> bool {
    if data.get(4..8) != Some(b"ftyp") {
        return false;
    }
    let size = data
        .get(0..4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .unwrap_or(0)
        .min(data.len());
    // major brand at 8, minor version at 12, compatible brands from 16
    let major = data.get(8..12);
    let compatible = data.get(16..size).unwrap_or_default().chunks_exact(4);
    major
        .into_iter()
        .chain(compatible)
        .any(|brand| BRANDS.iter().any(|b| b.as_slice() == brand))
}

#[derive(Debug, Clone)]
struct BoxHeader {
    kind: [u8; 4],
    payload: Range<usize>,
}

/// Split `range` of `data` into consecutive boxes.
fn boxes(data: &[u8], range: Range<usize>) -> Result<Vec<BoxHeader>, ContainerError> {
    let mut out = Vec::new();
    let mut pos = range.start;
    while pos < range.end {
        let mut r = Reader::new(data, pos..range.end);
        let size32 = r.u32()? as usize;
        let kind = r.fourcc()?;
        let (header_len, size) = match size32 {
            0 => (8, range.end - pos),
            1 => (16, r.u64()? as usize),
            n => (8, n),
        };
        let end = pos
            .checked_add(size)
            .filter(|end| size >= header_len && *end <= range.end)
            .ok_or(ContainerError::Truncated {
                format: FORMAT,
                offset: pos,
            })?;
        out.push(BoxHeader {
            kind,
            payload: pos + header_len..end,
        });
        pos = end;
    }
    Ok(out)
}

#[derive(Debug)]
struct Location {
    construction_method: u8,
    base_offset: u64,
    extents: Vec<(u64, u64)>,
}

fn parse_meta(data: &[u8], meta: &BoxHeader) -> Result<Vec<MetadataItem>, ContainerError> {
    // meta is a full box: skip version and flags
    let children = boxes(data, meta.payload.start + 4..meta.payload.end)?;

    let mut kinds = Vec::new();
    if let Some(iinf) = children.iter().find(|b| &b.kind == b"iinf") {
        let mut r = Reader::new(data, iinf.payload.clone());
        let version = r.u8()?;
        r.skip(3)?;
        if version == 0 {
            r.u16()?;
        } else {
            r.u32()?;
        }
        for infe in boxes(data, r.pos..iinf.payload.end)? {
            if &infe.kind == b"infe"
                && let Some(entry) = parse_infe(data, &infe)?
            {
                kinds.push(entry);
            }
        }
    }
    if kinds.is_empty() {
        return Ok(Vec::new());
    }

    let iloc = children
        .iter()
        .find(|b| &b.kind == b"iloc")
        .ok_or_else(|| ContainerError::Invalid {
            format: FORMAT,
            reason: "metadata items without an iloc box".into(),
        })?;
    let locations = parse_iloc(data, iloc)?;
    let idat = children.iter().find(|b| &b.kind == b"idat");

    let mut items = Vec::new();
    for (id, kind) in kinds {
        let Some((_, location)) = locations.iter().find(|(loc_id, _)| *loc_id == id) else {
            continue;
        };
        let origin = match (location.construction_method, idat) {
            (0, _) => 0u64,
            (1, Some(idat)) => idat.payload.start as u64,
            (method, _) => {
                return Err(ContainerError::Invalid {
                    format: FORMAT,
                    reason: format!("item {id} uses unsupported construction method {method}"),
                });
            }
        };
        let limit = match location.construction_method {
            1 => idat.map(|b| b.payload.end).unwrap_or(data.len()),
            _ => data.len(),
        };

        let mut extents = Vec::new();
        for &(offset, length) in &location.extents {
            let start = origin
                .checked_add(location.base_offset)
                .and_then(|s| s.checked_add(offset))
                .map(|s| s as usize)
                .filter(|s| *s <= limit)
                .ok_or(ContainerError::Truncated {
                    format: FORMAT,
                    offset: limit,
                })?;
            // length 0 means "to the end of the referenced data"
            let end = if length == 0 {
                limit
            } else {
                start
                    .checked_add(length as usize)
                    .filter(|e| *e <= limit)
                    .ok_or(ContainerError::Truncated {
                        format: FORMAT,
                        offset: start,
                    })?
            };
            extents.push(start..end);
        }
        items.push(MetadataItem { id, kind, extents });
    }
    Ok(items)
}

/// Item id and kind for `Exif` and XMP `mime` entries; `None` otherwise.
fn parse_infe(data: &[u8], infe: &BoxHeader) -> Result<Option<(u32, ItemKind)>, ContainerError> {
    let mut r = Reader::new(data, infe.payload.clone());
    let version = r.u8()?;
    r.skip(3)?;
    if version < 2 {
        return Ok(None);
    }
    let id = if version == 2 { r.u16()? as u32 } else { r.u32()? };
    r.u16()?; // protection index
    let item_type = r.fourcc()?;
    r.cstring()?; // item name

    let kind = match &item_type {
        b"Exif" => Some(ItemKind::Exif),
        b"mime" if r.cstring()? == XMP_CONTENT_TYPE => Some(ItemKind::Xmp),
        _ => None,
    };
    Ok(kind.map(|k| (id, k)))
}

fn parse_iloc(data: &[u8], iloc: &BoxHeader) -> Result<Vec<(u32, Location)>, ContainerError> {
    let mut r = Reader::new(data, iloc.payload.clone());
    let version = r.u8()?;
    r.skip(3)?;
    let sizes = r.u8()?;
    let (offset_size, length_size) = (sizes >> 4, sizes & 0x0F);
    let sizes = r.u8()?;
    let base_offset_size = sizes >> 4;
    let index_size = if version == 1 || version == 2 {
        sizes & 0x0F
    } else {
        0
    };
    let item_count = if version < 2 { r.u16()? as u32 } else { r.u32()? };

    // item_count is untrusted; the box length bounds the loop
    let mut out = Vec::new();
    for _ in 0..item_count {
        let id = if version < 2 { r.u16()? as u32 } else { r.u32()? };
        let construction_method = if version == 1 || version == 2 {
            (r.u16()? & 0x0F) as u8
        } else {
            0
        };
        r.u16()?; // data reference index
        let base_offset = r.uint(base_offset_size)?;
        let extent_count = r.u16()?;
        let mut extents = Vec::new();
        for _ in 0..extent_count {
            r.uint(index_size)?;
            let offset = r.uint(offset_size)?;
            let length = r.uint(length_size)?;
            extents.push((offset, length));
        }
        out.push((
            id,
            Location {
                construction_method,
                base_offset,
                extents,
            },
        ));
    }
    Ok(out)
}

/// Big-endian cursor bounded to one box.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], range: Range<usize>) -> Self {
        Self {
            data,
            pos: range.start,
            end: range.end.min(data.len()),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ContainerError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|e| *e <= self.end)
            .ok_or(ContainerError::Truncated {
                format: FORMAT,
                offset: self.pos,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, n: usize) -> Result<(), ContainerError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ContainerError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ContainerError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ContainerError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, ContainerError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    /// Unsigned integer of 0, 4 or 8 bytes, as `iloc` field sizes allow.
    fn uint(&mut self, size: u8) -> Result<u64, ContainerError> {
        match size {
            0 => Ok(0),
            4 => self.u32().map(u64::from),
            8 => self.u64(),
            other => Err(ContainerError::Invalid {
                format: FORMAT,
                reason: format!("iloc field size {other}"),
            }),
        }
    }

    fn fourcc(&mut self) -> Result<[u8; 4], ContainerError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn cstring(&mut self) -> Result<String, ContainerError> {
        let rest = &self.data[self.pos..self.end];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += (len + 1).min(rest.len());
        Ok(s)
    }
}
