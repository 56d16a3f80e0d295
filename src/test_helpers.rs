//! Shared test utilities for the photo-anonymizer test suite.
//!
//! Fixture images are built in memory so tests never depend on files in the
//! repository: noisy JPEGs and PNGs from the `image` encoders, metadata
//! segments and chunks to inject into them, and a minimal HEIF container
//! carrying Exif and XMP items.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = jpeg_with_segments(
//!     &jpeg_bytes(64, 64, 95),
//!     vec![Segment::exif(&sample_exif().to_tiff()), xmp_segment()],
//! );
//! let path = write_file(tmp.path(), "photo.jpg", &bytes);
//! ```

use crate::imaging::exif::{ExifTags, ORIENTATION, TagValue};
use crate::imaging::jpeg::{JpegFile, Segment};
use crate::imaging::png::{Chunk, PngFile};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Pixel fixtures
// =========================================================================

/// Deterministic noise, so JPEG sizes actually respond to quality.
fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    let mut state = 0x2545_F491u32;
    RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (state >> 24) as u8;
        Rgb([noise, (x as u8).wrapping_mul(7) ^ noise, (y as u8).wrapping_mul(5)])
    })
}

/// A plain JPEG as the `image` encoder writes it (JFIF header, no metadata).
pub fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = noisy_rgb(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A plain PNG (IHDR, IDAT, IEND).
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = noisy_rgb(width, height);
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// Metadata fixtures
// =========================================================================

/// Orientation, a timestamp and a maker note.
pub fn sample_exif() -> ExifTags {
    let mut tags = ExifTags::new();
    tags.insert(ORIENTATION, TagValue::Short(vec![1]));
    tags.insert(306, TagValue::Ascii("2024".into()));
    tags.insert(37500, TagValue::Undefined(b"maker-note-bytes".to_vec()));
    tags
}

/// An XMP packet naming the photographer.
pub fn sample_xmp() -> &'static [u8] {
    b"<?xpacket begin=\"\xEF\xBB\xBF\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
 <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
  <rdf:Description xmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n\
   dc:creator=\"Jane Doe\" dc:rights=\"Jane Doe, all rights reserved\"/>\n\
 </rdf:RDF>\n\
</x:xmpmeta>\n\
<?xpacket end=\"w\"?>"
}

pub fn xmp_segment() -> Segment {
    let mut payload = b"http://ns.adobe.com/xap/1.0/\0".to_vec();
    payload.extend_from_slice(sample_xmp());
    Segment {
        marker: 0xE1,
        payload,
    }
}

/// Photoshop IRB with an IPTC by-line record.
pub fn iptc_segment() -> Segment {
    let mut payload = b"Photoshop 3.0\08BIM\x04\x04\0\0".to_vec();
    let record = b"\x1C\x02\x50\x00\x08Jane Doe";
    payload.extend_from_slice(&(record.len() as u32).to_be_bytes());
    payload.extend_from_slice(record);
    Segment {
        marker: 0xED,
        payload,
    }
}

pub fn comment_segment() -> Segment {
    Segment {
        marker: 0xFE,
        payload: b"Shot by Jane Doe".to_vec(),
    }
}

/// Insert `segments` (in order) after the JFIF header of `jpeg`.
pub fn jpeg_with_segments(jpeg: &[u8], segments: Vec<Segment>) -> Vec<u8> {
    let mut file = JpegFile::parse(jpeg).unwrap();
    file.insert_metadata(segments);
    file.to_bytes().unwrap()
}

/// Insert `chunks` (in order) before the first IDAT of `png`.
pub fn png_with_chunks(png: &[u8], chunks: Vec<Chunk>) -> Vec<u8> {
    let mut file = PngFile::parse(png).unwrap();
    for chunk in chunks {
        file.insert_before_data(chunk);
    }
    file.to_bytes()
}

// =========================================================================
// HEIF fixture
// =========================================================================

pub fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

pub fn full_box(kind: &[u8; 4], version: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version, 0, 0, 0];
    body.extend_from_slice(payload);
    mp4_box(kind, &body)
}

/// A minimal HEIC file: `ftyp`, a `meta` box describing one image item plus
/// optional Exif and XMP items, and an `mdat` holding all item data.
///
/// The image item is placeholder bytes, not HEVC. `mdat` is the last box so
/// truncating the file cuts into it.
pub fn heif_bytes(exif: Option<&[u8]>, xmp: Option<&[u8]>) -> Vec<u8> {
    struct Item {
        id: u16,
        kind: &'static [u8; 4],
        content_type: Option<&'static str>,
        data: Vec<u8>,
    }

    let mut items = vec![Item {
        id: 1,
        kind: b"hvc1",
        content_type: None,
        data: b"placeholder coded image data".to_vec(),
    }];
    if let Some(tiff) = exif {
        let mut data = 0u32.to_be_bytes().to_vec();
        data.extend_from_slice(tiff);
        items.push(Item {
            id: 2,
            kind: b"Exif",
            content_type: None,
            data,
        });
    }
    if let Some(xmp) = xmp {
        items.push(Item {
            id: 3,
            kind: b"mime",
            content_type: Some("application/rdf+xml"),
            data: xmp.to_vec(),
        });
    }

    let mut ftyp = b"heic".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"mif1heic");
    let ftyp = mp4_box(b"ftyp", &ftyp);

    let meta_box = |mdat_data_start: usize| -> Vec<u8> {
        let mut hdlr = 0u32.to_be_bytes().to_vec();
        hdlr.extend_from_slice(b"pict");
        hdlr.extend_from_slice(&[0u8; 12]);
        hdlr.push(0);
        let hdlr = full_box(b"hdlr", 0, &hdlr);
        let pitm = full_box(b"pitm", 0, &1u16.to_be_bytes());

        let mut iinf = (items.len() as u16).to_be_bytes().to_vec();
        for item in &items {
            let mut infe = item.id.to_be_bytes().to_vec();
            infe.extend_from_slice(&0u16.to_be_bytes());
            infe.extend_from_slice(item.kind);
            infe.push(0);
            if let Some(content_type) = item.content_type {
                infe.extend_from_slice(content_type.as_bytes());
                infe.push(0);
            }
            iinf.extend_from_slice(&full_box(b"infe", 2, &infe));
        }
        let iinf = full_box(b"iinf", 0, &iinf);

        // version 0: 4-byte offsets and lengths, no base offset
        let mut iloc = vec![0x44, 0x00];
        iloc.extend_from_slice(&(items.len() as u16).to_be_bytes());
        let mut offset = mdat_data_start;
        for item in &items {
            iloc.extend_from_slice(&item.id.to_be_bytes());
            iloc.extend_from_slice(&0u16.to_be_bytes());
            iloc.extend_from_slice(&1u16.to_be_bytes());
            iloc.extend_from_slice(&(offset as u32).to_be_bytes());
            iloc.extend_from_slice(&(item.data.len() as u32).to_be_bytes());
            offset += item.data.len();
        }
        let iloc = full_box(b"iloc", 0, &iloc);

        full_box(b"meta", 0, &[hdlr, pitm, iinf, iloc].concat())
    };

    // Offsets inside iloc do not change the meta box size
    let mdat_data_start = ftyp.len() + meta_box(0).len() + 8;
    let meta = meta_box(mdat_data_start);
    let mdat_payload: Vec<u8> = items.iter().flat_map(|i| i.data.iter().copied()).collect();
    let mdat = mp4_box(b"mdat", &mdat_payload);

    [ftyp, meta, mdat].concat()
}

/// A real HEIC file with HEVC-coded noise, encoded by libheif, plus an
/// optional Exif item.
#[cfg(feature = "heif")]
pub fn encoded_heic(width: u32, height: u32, exif: Option<&[u8]>) -> Vec<u8> {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    let rgb = noisy_rgb(width, height);
    let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
    image
        .create_plane(Channel::Interleaved, width, height, 8)
        .unwrap();
    let planes = image.planes_mut();
    let plane = planes.interleaved.unwrap();
    let row = width as usize * 3;
    for (y, line) in rgb.as_raw().chunks(row).enumerate() {
        let start = y * plane.stride;
        plane.data[start..start + row].copy_from_slice(line);
    }

    let lib_heif = LibHeif::new();
    let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).unwrap();
    encoder.set_quality(EncoderQuality::Lossy(80)).unwrap();
    let mut context = HeifContext::new().unwrap();
    let handle = context.encode_image(&image, &mut encoder, None).unwrap();
    if let Some(tiff) = exif {
        context.add_exif_metadata(&handle, tiff).unwrap();
    }
    context.write_to_bytes().unwrap()
}

// =========================================================================
// Filesystem
// =========================================================================

/// Write `bytes` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
