//! # Photo Anonymizer
//!
//! Batch-removes identifying metadata from a folder of photos before they
//! are shared. Each supported image (JPEG, PNG, HEIF/HEIC) in the input
//! folder is written to the output folder with its metadata stripped down to
//! the orientation tag, or preserved as-is. Optionally the tool converts
//! images to JPEG first, re-encodes JPEGs at a lower quality, renames
//! outputs to the SHA-256 of their original name and deletes the originals.
//!
//! # Pipeline
//!
//! ```text
//! settings.json ─► Settings ─► inventory(INPUT) ─► per file:
//!                                                   convert? → strip|preserve → save(compress?) → cleanup
//! ```
//!
//! A run is sequential and fail-fast: the first file that cannot be read,
//! decoded or written stops everything. A bad settings file never reaches the
//! pipeline; it is reset to defaults and the run stops.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | JSON settings file: load, validate into typed [`config::Settings`], reset to defaults |
//! | [`inventory`] | Lists supported files in the input folder |
//! | [`naming`] | Output file name, optionally hashed |
//! | [`imaging`] | Container parsing (JPEG, PNG, HEIF), EXIF editing, `image`-crate backend |
//! | [`process`] | Per-file pipeline and the run driver |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Metadata Is Edited in the Container
//!
//! Stripping works on JPEG marker segments, PNG chunks and HEIF items
//! directly. The compressed image data is never decoded unless the file is
//! being compressed or converted, so a strip is lossless and a preserve run
//! without compression produces a byte-identical copy.
//!
//! ## HEIF Pixels Come From libheif
//!
//! There is no pure-Rust HEVC decoder. Anonymizing a HEIF file never needs
//! one: its Exif and XMP items are overwritten in place, which leaves every
//! box offset valid. Converting HEIF to JPEG does, and goes through the
//! system libheif when the crate is built with the `heif` feature. Without
//! the feature such a conversion fails the run.

pub mod config;
pub mod imaging;
pub mod inventory;
pub mod naming;
pub mod output;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
