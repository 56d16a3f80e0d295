//! Parameter types for backend operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline (which decides what gets written where)
//! and the [`backend`](super::backend) (which does the codec work), so the
//! backend can be swapped for a mock in tests.

use std::path::PathBuf;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    /// The "web low" preset used when compression is enabled.
    pub const WEB_LOW: Quality = Quality(50);

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Parameters for writing a loaded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    pub output: PathBuf,
    /// Re-encode the pixels at this quality. `None` writes the container
    /// as-is, with any metadata edits applied.
    pub recompress: Option<Quality>,
}

/// Parameters for converting a source image to JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
}
