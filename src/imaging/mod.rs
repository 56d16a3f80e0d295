//! Image handling: container parsing, metadata editing and JPEG codec work.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | magic bytes ([`ImageKind::sniff`]) |
//! | **EXIF** | custom TIFF/IFD parser and writer |
//! | **Strip metadata** | custom JPEG segment / PNG chunk / HEIF item editors |
//! | **Compress, convert** | `image` JPEG encoder |
//! | **Decode HEIF** | `libheif-rs` (`heif` feature) |
//!
//! The module is split into:
//! - **Containers**: [`jpeg`], [`png`], [`heif`] and the [`exif`] tag model
//! - **Payload**: [`ImagePayload`], a parsed container the pipeline edits
//! - **Parameters**: Data structures describing save and convert operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod exif;
pub mod heif;
pub mod jpeg;
mod params;
pub mod payload;
pub mod png;
pub mod rust_backend;

pub use backend::{BackendError, ContainerError, ImageBackend};
pub use exif::{ExifTags, TagValue};
pub use params::{ConvertParams, Quality, SaveParams};
pub use payload::{ImageKind, ImagePayload};
pub use rust_backend::RustBackend;
