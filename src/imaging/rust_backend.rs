//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | magic bytes ([`ImageKind::sniff`]) |
//! | Decode (JPEG, PNG) | `image::load_from_memory_with_format` |
//! | Decode (HEIF) | `libheif-rs`, behind the `heif` feature |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Metadata | custom container parsers ([`jpeg`](super::jpeg), [`png`](super::png), [`heif`](super::heif)) |
//!
//! HEIF/HEIC pixels need an HEVC decoder, and there is no pure-Rust one.
//! With the `heif` feature the system libheif decodes them; without it HEIF
//! files still load and save (metadata is edited in the container), but
//! converting one returns [`BackendError::UnsupportedCodec`].

use super::backend::{BackendError, ImageBackend};
use super::exif;
use super::jpeg::{EXIF_HEADER, JpegFile, MAX_SEGMENT_PAYLOAD, Segment};
use super::params::{ConvertParams, Quality, SaveParams};
use super::payload::{ImageKind, ImagePayload};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;

/// Pure Rust backend using the `image` crate for pixel work.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, BackendError> {
    std::fs::read(path).map_err(|source| BackendError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    std::fs::write(path, bytes).map_err(|source| BackendError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn sniff(path: &Path, bytes: &[u8]) -> Result<ImageKind, BackendError> {
    ImageKind::sniff(bytes).ok_or_else(|| BackendError::UnsupportedFormat(path.to_path_buf()))
}

fn decode(path: &Path, bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, BackendError> {
    #[cfg(feature = "heif")]
    {
        if kind == ImageKind::Heif {
            return decode_heif(path, bytes);
        }
    }

    let format = kind.pixel_format().ok_or_else(|| BackendError::UnsupportedCodec {
        path: path.to_path_buf(),
        kind,
    })?;
    image::load_from_memory_with_format(bytes, format).map_err(|source| BackendError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode the primary image of a HEIF file to 8-bit RGB.
///
/// libheif applies the container's rotation and mirroring (`irot`/`imir`)
/// while decoding, so the pixels come out upright.
#[cfg(feature = "heif")]
fn decode_heif(path: &Path, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    use super::backend::ContainerError;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_error = |source| BackendError::HeifDecode {
        path: path.to_path_buf(),
        source,
    };
    let malformed = |reason: &str| {
        BackendError::container(
            path,
            ContainerError::Invalid {
                format: "HEIF",
                reason: reason.to_string(),
            },
        )
    };

    let context = HeifContext::read_from_bytes(bytes).map_err(heif_error)?;
    let handle = context.primary_image_handle().map_err(heif_error)?;
    let decoded = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_error)?;
    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| malformed("decoded image has no interleaved RGB plane"))?;

    // Rows are padded to `stride` bytes
    let (width, height) = (plane.width, plane.height);
    let row = width as usize * 3;
    let mut rgb = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * plane.stride;
        let line = plane
            .data
            .get(start..start + row)
            .ok_or_else(|| malformed("decoded plane shorter than its dimensions"))?;
        rgb.extend_from_slice(line);
    }
    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| malformed("decoded plane does not match its dimensions"))
}

/// Encode as baseline RGB JPEG. Alpha is dropped.
fn encode_jpeg(
    path: &Path,
    img: &DynamicImage,
    quality: Quality,
) -> Result<JpegFile, BackendError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|source| BackendError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    JpegFile::parse(&buf).map_err(|e| BackendError::container(path, e))
}

impl ImageBackend for RustBackend {
    fn load(&self, path: &Path) -> Result<ImagePayload, BackendError> {
        let bytes = read_file(path)?;
        let kind = sniff(path, &bytes)?;
        ImagePayload::parse(kind, bytes).map_err(|e| BackendError::container(path, e))
    }

    fn save(&self, payload: &ImagePayload, params: &SaveParams) -> Result<(), BackendError> {
        let output = &params.output;
        let bytes = match (params.recompress, payload.as_jpeg()) {
            (Some(quality), Some(original)) => {
                let source = original
                    .to_bytes()
                    .map_err(|e| BackendError::container(output, e))?;
                let img = decode(output, &source, ImageKind::Jpeg)?;
                let mut encoded = encode_jpeg(output, &img, quality)?;
                encoded.insert_metadata(original.metadata_segments().cloned());
                encoded.to_bytes()
            }
            (Some(_), None) => {
                tracing::debug!(
                    "{} payload is never recompressed, writing as-is",
                    payload.kind()
                );
                payload.to_bytes()
            }
            (None, _) => payload.to_bytes(),
        }
        .map_err(|e| BackendError::container(output, e))?;
        write_file(output, &bytes)
    }

    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError> {
        let bytes = read_file(&params.source)?;
        let kind = sniff(&params.source, &bytes)?;
        let img = decode(&params.source, &bytes, kind)?;
        let mut carried = ImagePayload::parse(kind, bytes)
            .map_err(|e| BackendError::container(&params.source, e))?
            .exif_block();
        // HEIF pixels are already upright; a carried-over rotation would apply twice
        if kind == ImageKind::Heif
            && let Some(upright) = carried.as_deref().and_then(exif::with_upright_orientation)
        {
            carried = Some(upright);
        }

        let mut jpeg = encode_jpeg(&params.output, &img, params.quality)?;
        if let Some(tiff) = carried {
            if EXIF_HEADER.len() + tiff.len() <= MAX_SEGMENT_PAYLOAD {
                jpeg.insert_metadata([Segment::exif(&tiff)]);
            } else {
                tracing::warn!(
                    "EXIF block of {} is {} bytes, too large for one JPEG segment; not carried over",
                    params.source.display(),
                    tiff.len()
                );
            }
        }
        let out = jpeg
            .to_bytes()
            .map_err(|e| BackendError::container(&params.output, e))?;
        write_file(&params.output, &out)
    }
}
