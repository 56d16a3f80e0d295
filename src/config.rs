//! Settings file loading and validation.
//!
//! The settings file is a small JSON document next to the tool:
//!
//! ```json
//! {
//!   "SETTINGS": {
//!     "INPUT_FILES_DIR": "/photos/INPUT",
//!     "OUTPUT_FILES_DIR": "/photos/OUTPUT",
//!     "FILENAME_HASHING": true,
//!     "DELETE_METADATA": true,
//!     "CONVERT_TO_JPEG": false,
//!     "COMPRESS_JPEG": false,
//!     "DELETE_ORIGINAL_IMAGE": false
//!   }
//! }
//! ```
//!
//! Every option is required and every flag must be a JSON boolean. Unknown
//! keys are rejected to catch typos early. There is no partial config: a
//! file that fails to load is replaced with [`Settings::defaults_for`] by
//! [`reset_settings`], and the caller stops so the operator can review it.
//!
//! Relative directories are resolved against the settings file's directory.
//! Loading produces a typed [`Settings`] whose policies are enums, so nothing
//! downstream re-checks option values.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("settings file {0} not found")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is invalid: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings file {path} is invalid: {reason}")]
    Validation { path: PathBuf, reason: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How output files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingPolicy {
    /// SHA-256 hex of the stem, original suffix kept.
    Hashed,
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataPolicy {
    /// Drop everything except the orientation tag.
    Strip,
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPolicy {
    /// Re-encode JPEG-family outputs at the web-low quality preset.
    WebLow,
    Off,
}

/// Validated run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Absolute.
    pub input_dir: PathBuf,
    /// Absolute.
    pub output_dir: PathBuf,
    pub naming: NamingPolicy,
    pub metadata: MetadataPolicy,
    pub compression: CompressionPolicy,
    pub convert_to_jpeg: bool,
    pub delete_original: bool,
}

impl Settings {
    /// Stock settings for a settings file at `path`: hashing and metadata
    /// removal on, everything else off, `INPUT` and `OUTPUT` beside the file.
    pub fn defaults_for(path: &Path) -> Result<Self, ConfigError> {
        let base = base_dir(path)?;
        Ok(Self {
            input_dir: base.join("INPUT"),
            output_dir: base.join("OUTPUT"),
            naming: NamingPolicy::Hashed,
            metadata: MetadataPolicy::Strip,
            compression: CompressionPolicy::Off,
            convert_to_jpeg: false,
            delete_original: false,
        })
    }

    fn to_file(&self) -> SettingsFile {
        SettingsFile {
            settings: RawSettings {
                input_files_dir: self.input_dir.clone(),
                output_files_dir: self.output_dir.clone(),
                filename_hashing: self.naming == NamingPolicy::Hashed,
                delete_metadata: self.metadata == MetadataPolicy::Strip,
                convert_to_jpeg: self.convert_to_jpeg,
                compress_jpeg: self.compression == CompressionPolicy::WebLow,
                delete_original_image: self.delete_original,
            },
        }
    }

    /// Pretty-printed JSON in the on-disk layout.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.to_file())?)
    }
}

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(rename = "SETTINGS")]
    settings: RawSettings,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
struct RawSettings {
    input_files_dir: PathBuf,
    output_files_dir: PathBuf,
    filename_hashing: bool,
    delete_metadata: bool,
    convert_to_jpeg: bool,
    compress_jpeg: bool,
    delete_original_image: bool,
}

impl RawSettings {
    fn validate(self, base: &Path) -> Result<Settings, String> {
        if self.input_files_dir.as_os_str().is_empty() {
            return Err("INPUT_FILES_DIR must not be empty".into());
        }
        if self.output_files_dir.as_os_str().is_empty() {
            return Err("OUTPUT_FILES_DIR must not be empty".into());
        }
        let input_dir = base.join(&self.input_files_dir);
        let output_dir = base.join(&self.output_files_dir);
        if input_dir == output_dir {
            return Err("INPUT_FILES_DIR and OUTPUT_FILES_DIR must differ".into());
        }

        Ok(Settings {
            input_dir,
            output_dir,
            naming: if self.filename_hashing {
                NamingPolicy::Hashed
            } else {
                NamingPolicy::Original
            },
            metadata: if self.delete_metadata {
                MetadataPolicy::Strip
            } else {
                MetadataPolicy::Preserve
            },
            compression: if self.compress_jpeg {
                CompressionPolicy::WebLow
            } else {
                CompressionPolicy::Off
            },
            convert_to_jpeg: self.convert_to_jpeg,
            delete_original: self.delete_original_image,
        })
    }
}

/// Absolute directory containing the settings file.
fn base_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let parent = path.parent().unwrap_or(Path::new(""));
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    std::path::absolute(parent).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate the settings file at `path`.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let file: SettingsFile =
        serde_json::from_str(&content).map_err(|source| ConfigError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    let base = base_dir(path)?;
    file.settings
        .validate(&base)
        .map_err(|reason| ConfigError::Validation {
            path: path.to_path_buf(),
            reason,
        })
}

/// Overwrite `path` with stock settings and return them.
pub fn reset_settings(path: &Path) -> Result<Settings, ConfigError> {
    let defaults = Settings::defaults_for(path)?;
    let json = defaults.to_json()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json + "\n").map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(defaults)
}

/// The stock settings document for a file at `path`.
///
/// Used by the `gen-config` CLI command.
pub fn default_settings_json(path: &Path) -> Result<String, ConfigError> {
    Settings::defaults_for(path)?.to_json()
}
