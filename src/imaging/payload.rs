//! The in-memory form of one image while the pipeline works on it.
//!
//! An [`ImagePayload`] is the parsed container (JPEG segments, PNG chunks or
//! HEIF boxes) around still-compressed image data. Metadata edits happen on
//! the container; pixels are only decoded when a save has to re-encode.

use super::backend::ContainerError;
use super::exif::{ExifError, ExifTags};
use super::heif::{self, HeifFile};
use super::jpeg::JpegFile;
use super::png::{self, PngFile};
use std::fmt;

/// Container families the pipeline can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Heif,
}

impl ImageKind {
    /// Identify a container from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&png::SIGNATURE) {
            Some(ImageKind::Png)
        } else if heif::has_heif_brand(bytes) {
            Some(ImageKind::Heif)
        } else {
            None
        }
    }

    /// The `image` crate format that can decode this kind's pixels.
    pub fn pixel_format(self) -> Option<image::ImageFormat> {
        match self {
            ImageKind::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageKind::Png => Some(image::ImageFormat::Png),
            ImageKind::Heif => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::Heif => "HEIF",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Container {
    Jpeg(JpegFile),
    Png(PngFile),
    Heif(HeifFile),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    container: Container,
}

impl ImagePayload {
    /// Parse `bytes` as a container of the given kind.
    pub fn parse(kind: ImageKind, bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let container = match kind {
            ImageKind::Jpeg => Container::Jpeg(JpegFile::parse(&bytes)?),
            ImageKind::Png => Container::Png(PngFile::parse(&bytes)?),
            ImageKind::Heif => Container::Heif(HeifFile::parse(bytes)?),
        };
        Ok(Self { container })
    }

    /// Sniff the kind, then parse.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let kind = ImageKind::sniff(&bytes).ok_or(ContainerError::UnknownFormat)?;
        Self::parse(kind, bytes)
    }

    pub fn kind(&self) -> ImageKind {
        match self.container {
            Container::Jpeg(_) => ImageKind::Jpeg,
            Container::Png(_) => ImageKind::Png,
            Container::Heif(_) => ImageKind::Heif,
        }
    }

    pub fn as_jpeg(&self) -> Option<&JpegFile> {
        match &self.container {
            Container::Jpeg(jpeg) => Some(jpeg),
            _ => None,
        }
    }

    /// Raw TIFF block of the embedded EXIF, if any.
    pub fn exif_block(&self) -> Option<Vec<u8>> {
        match &self.container {
            Container::Jpeg(jpeg) => jpeg.exif().map(<[u8]>::to_vec),
            Container::Png(png) => png.exif().map(<[u8]>::to_vec),
            Container::Heif(heif) => heif.exif(),
        }
    }

    /// The embedded EXIF tag set. `Ok(None)` when the image has no EXIF.
    pub fn exif(&self) -> Result<Option<ExifTags>, ExifError> {
        self.exif_block()
            .map(|tiff| ExifTags::parse(&tiff))
            .transpose()
    }

    /// Remove identifying metadata, keeping only the orientation tag.
    pub fn strip_metadata(&mut self) {
        match &mut self.container {
            Container::Jpeg(jpeg) => jpeg.strip_metadata(),
            Container::Png(png) => png.strip_metadata(),
            Container::Heif(heif) => heif.strip_metadata(),
        }
    }

    /// Serialize the container, including any metadata edits.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        match &self.container {
            Container::Jpeg(jpeg) => jpeg.to_bytes(),
            Container::Png(png) => Ok(png.to_bytes()),
            Container::Heif(heif) => Ok(heif.as_bytes().to_vec()),
        }
    }
}
