//! PNG chunk container.
//!
//! Chunks are kept as `(type, data)` pairs; CRCs are recomputed on write.
//! Metadata lives in:
//!
//! - `eXIf`: raw TIFF block (some writers prefix it with `Exif\0\0`)
//! - `tEXt` / `zTXt` / `iTXt`: free-form text, including XMP
//!   (`iTXt` keyword `XML:com.adobe.xmp`)
//! - `tIME`: last-modification timestamp
//!
//! Color chunks (`iCCP`, `sRGB`, `gAMA`, `cHRM`) are rendering information
//! and are never stripped.

use super::backend::ContainerError;
use super::exif;
use super::jpeg::EXIF_HEADER;

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const FORMAT: &str = "PNG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: [u8; 4],
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(kind: &[u8; 4], data: Vec<u8>) -> Self {
        Self { kind: *kind, data }
    }

    fn is_text(&self) -> bool {
        matches!(&self.kind, b"tEXt" | b"zTXt" | b"iTXt" | b"tIME")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngFile {
    pub chunks: Vec<Chunk>,
    trailer: Vec<u8>,
}

impl PngFile {
    pub fn parse(data: &[u8]) -> Result<Self, ContainerError> {
        if !data.starts_with(&SIGNATURE) {
            return Err(ContainerError::Invalid {
                format: FORMAT,
                reason: "missing signature".into(),
            });
        }

        let mut pos = SIGNATURE.len();
        let mut chunks = Vec::new();
        loop {
            let header = data.get(pos..pos + 8).ok_or(ContainerError::Truncated {
                format: FORMAT,
                offset: pos,
            })?;
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let kind = [header[4], header[5], header[6], header[7]];
            let data_start = pos + 8;
            let chunk_end = data_start
                .checked_add(len)
                .and_then(|end| end.checked_add(4))
                .filter(|end| *end <= data.len())
                .ok_or(ContainerError::Truncated {
                    format: FORMAT,
                    offset: pos,
                })?;

            chunks.push(Chunk {
                kind,
                data: data[data_start..data_start + len].to_vec(),
            });
            pos = chunk_end;

            if &kind == b"IEND" {
                return Ok(Self {
                    chunks,
                    trailer: data[pos..].to_vec(),
                });
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let body: usize = self.chunks.iter().map(|c| c.data.len() + 12).sum();
        let mut out = Vec::with_capacity(SIGNATURE.len() + body + self.trailer.len());
        out.extend_from_slice(&SIGNATURE);
        for chunk in &self.chunks {
            out.extend_from_slice(&(chunk.data.len() as u32).to_be_bytes());
            out.extend_from_slice(&chunk.kind);
            out.extend_from_slice(&chunk.data);
            out.extend_from_slice(&crc32(&chunk.kind, &chunk.data).to_be_bytes());
        }
        out.extend_from_slice(&self.trailer);
        out
    }

    /// TIFF block of the `eXIf` chunk.
    pub fn exif(&self) -> Option<&[u8]> {
        self.chunks
            .iter()
            .find(|c| &c.kind == b"eXIf")
            .map(|c| c.data.strip_prefix(EXIF_HEADER).unwrap_or(&c.data))
    }

    /// Insert an ancillary chunk before the first `IDAT`.
    #[cfg(test)]
    pub fn insert_before_data(&mut self, chunk: Chunk) {
        let at = self
            .chunks
            .iter()
            .position(|c| &c.kind == b"IDAT")
            .unwrap_or(self.chunks.len());
        self.chunks.insert(at, chunk);
    }

    /// Reduce `eXIf` to orientation, drop text and time chunks and anything
    /// after `IEND`.
    pub fn strip_metadata(&mut self) {
        self.chunks.retain(|c| !c.is_text());
        self.chunks.retain_mut(|chunk| {
            if &chunk.kind != b"eXIf" {
                return true;
            }
            let tiff = chunk.data.strip_prefix(EXIF_HEADER).unwrap_or(&chunk.data);
            match exif::orientation_only(tiff) {
                Some(reduced) => {
                    chunk.data = reduced;
                    true
                }
                None => false,
            }
        });
        self.trailer.clear();
    }
}

/// CRC-32 (ISO-HDLC) over chunk type and data, as PNG requires.
fn crc32(kind: &[u8], data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in kind.iter().chain(data) {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
