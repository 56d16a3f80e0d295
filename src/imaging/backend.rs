//! Image backend trait and shared error types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipeline needs
//! from an imaging library: load a file into an [`ImagePayload`], save a
//! payload (optionally re-encoding it), and convert a file to JPEG.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.

use super::params::{ConvertParams, SaveParams};
use super::payload::{ImageKind, ImagePayload};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural problems in a JPEG, PNG or HEIF container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("not a recognised image container")]
    UnknownFormat,
    #[error("{format} stream truncated at byte {offset}")]
    Truncated { format: &'static str, offset: usize },
    #[error("invalid {format} stream: {reason}")]
    Invalid {
        format: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("malformed image {path}: {source}")]
    Container {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },
    #[cfg(feature = "heif")]
    #[error("failed to decode {path}: {source}")]
    HeifDecode {
        path: PathBuf,
        #[source]
        source: libheif_rs::HeifError,
    },
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("no {kind} decoder available for {path}")]
    UnsupportedCodec { path: PathBuf, kind: ImageKind },
}

impl BackendError {
    pub(crate) fn container(path: &Path, source: ContainerError) -> Self {
        match source {
            ContainerError::UnknownFormat => BackendError::UnsupportedFormat(path.to_path_buf()),
            source => BackendError::Container {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Trait for imaging backends.
///
/// Implementations own every codec decision; the pipeline only chooses
/// *which* operation runs and with what parameters.
pub trait ImageBackend {
    /// Read and validate an image, returning its container and metadata.
    fn load(&self, path: &Path) -> Result<ImagePayload, BackendError>;

    /// Write a payload to `params.output`, re-encoding if `params.recompress` asks for it.
    fn save(&self, payload: &ImagePayload, params: &SaveParams) -> Result<(), BackendError>;

    /// Decode `params.source` and write it as a JPEG to `params.output`.
    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError>;
}
