//! Input folder inventory.
//!
//! Lists the regular files directly inside the input directory whose suffix
//! is on the allow-list. There is no recursion: subdirectories are counted
//! as unsupported entries, like any other file the pipeline cannot handle.
//! Hidden entries (names starting with `.`) get no special treatment:
//! `.beach.jpg` is processed and `.DS_Store` counts as unsupported.
//!
//! Suffixes are compared ASCII case-insensitively, so `photo.HEIC` and
//! `IMG_0001.JPG` are picked up as cameras write them.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Suffixes (without the dot) the pipeline accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heif", "heic", "heix"];

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One supported input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// File name without its final suffix.
    pub stem: OsString,
}

impl InputFile {
    /// Build a record for `path` if its suffix is supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        if !is_supported(path.extension()?) {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            stem: path.file_stem()?.to_os_string(),
        })
    }

    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Supported files, sorted by path.
    pub files: Vec<InputFile>,
    /// Every entry examined, supported or not.
    pub total_entries: usize,
}

impl Inventory {
    pub fn unsupported(&self) -> usize {
        self.total_entries - self.files.len()
    }
}

pub fn is_supported(extension: &OsStr) -> bool {
    extension
        .to_str()
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Whether `path` has a `jpg`/`jpeg` suffix (any case).
pub fn is_jpeg_family(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

/// Inventory the entries directly inside `dir`.
pub fn scan(dir: &Path) -> Result<Inventory, InventoryError> {
    let mut inventory = Inventory::default();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| InventoryError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        inventory.total_entries += 1;

        let record = if entry.file_type().is_file() {
            InputFile::from_path(entry.path())
        } else {
            None
        };
        match record {
            Some(file) => inventory.files.push(file),
            None => tracing::debug!("skipping unsupported entry {}", entry.path().display()),
        }
    }
    Ok(inventory)
}
