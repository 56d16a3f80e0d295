//! The anonymizing pipeline.
//!
//! A run loads the settings, makes sure the input and output folders exist,
//! inventories the input folder and pushes every supported file through the
//! per-file pipeline, strictly one after another:
//!
//! ```text
//! source ──convert?──► <stem>.JPG (staged in OUTPUT)
//!                          │
//!                     load → strip / preserve → save (compress?) ──► OUTPUT/<name>
//!                          │
//!              delete original? · remove staged file
//! ```
//!
//! ## Stages
//!
//! 1. **Conversion** (`CONVERT_TO_JPEG`): decode and re-encode as JPEG into
//!    the output folder; later stages work on that staged file. With
//!    `DELETE_ORIGINAL_IMAGE` the source is removed right after.
//! 2. **Metadata**: strip everything but orientation, or keep it all.
//! 3. **Save**: write to the resolved output path. JPEG-family files are
//!    re-encoded at the web-low preset when `COMPRESS_JPEG` is on.
//! 4. **Cleanup**: delete the original if asked, then the staged file unless
//!    it *is* the output (hashing off makes the two paths coincide).
//!
//! Deletions are best-effort. Any other failure stops the run: there is no
//! retry and no skipping of a bad file.
//!
//! ## Configuration errors
//!
//! [`run`] treats any settings problem the same way: the file is rewritten
//! with defaults and the run stops with [`RunError::ConfigReset`] before
//! any image is touched.

use crate::config::{self, CompressionPolicy, ConfigError, MetadataPolicy, Settings};
use crate::imaging::{BackendError, ConvertParams, ImageBackend, Quality, RustBackend, SaveParams};
use crate::inventory::{self, InputFile, Inventory, InventoryError};
use crate::naming;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("failed to process {file}: {source}")]
    Image {
        file: PathBuf,
        #[source]
        source: BackendError,
    },
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{source}; defaults were written to {path}, review them and run again")]
    ConfigReset {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("could not reset settings: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Progress reported while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The input folder did not exist and was created empty.
    InputDirCreated(PathBuf),
    Inventory {
        files: usize,
        unsupported: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        name: String,
    },
    FileFinished {
        index: usize,
        total: usize,
        name: String,
    },
    Finished {
        processed: usize,
        elapsed: Duration,
    },
}

/// Where one input ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub inventory: Inventory,
    pub outputs: Vec<FileOutcome>,
    pub elapsed: Duration,
}

/// Result of a dry run: what would be processed and where it would go.
#[derive(Debug)]
pub struct CheckReport {
    pub settings: Settings,
    pub input_created: bool,
    pub inventory: Inventory,
    pub destinations: Vec<FileOutcome>,
}

fn send(events: &Option<Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        // Receiver may already be gone
        tx.send(event).ok();
    }
}

/// Quality to re-encode at when saving `working`, if any.
pub fn compression_for(working: &Path, policy: CompressionPolicy) -> Option<Quality> {
    match policy {
        CompressionPolicy::WebLow if inventory::is_jpeg_family(working) => Some(Quality::WEB_LOW),
        _ => None,
    }
}

/// The converted JPEG for `file`, staged in the output folder.
pub fn staging_path(file: &InputFile, output_dir: &Path) -> PathBuf {
    let mut name = file.stem.clone();
    name.push(".JPG");
    output_dir.join(name)
}

/// Final output path for `file`, accounting for conversion.
pub fn destination_for(file: &InputFile, settings: &Settings) -> PathBuf {
    let working = if settings.convert_to_jpeg {
        staging_path(file, &settings.output_dir)
    } else {
        file.path.clone()
    };
    naming::resolve_output_path(&working, &settings.output_dir, settings.naming)
}

fn remove_best_effort(path: &Path, what: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("removed {what} {}", path.display()),
        Err(e) => tracing::debug!("could not remove {what} {}: {e}", path.display()),
    }
}

/// Create the input and output folders if needed. Returns whether the
/// input folder had to be created.
pub fn prepare_directories(settings: &Settings) -> Result<bool, ProcessError> {
    let create = |path: &Path| {
        std::fs::create_dir_all(path).map_err(|source| ProcessError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    };
    let input_created = !settings.input_dir.is_dir();
    create(&settings.input_dir)?;
    create(&settings.output_dir)?;
    if input_created {
        tracing::warn!(
            "input folder {} did not exist and was created",
            settings.input_dir.display()
        );
    }
    Ok(input_created)
}

/// Run one file through conversion, metadata handling, save and cleanup.
pub fn process_file(
    backend: &impl ImageBackend,
    file: &InputFile,
    settings: &Settings,
) -> Result<FileOutcome, ProcessError> {
    let image_error = |source| ProcessError::Image {
        file: file.path.clone(),
        source,
    };

    let mut working = file.path.clone();
    let mut staged = None;
    let mut original_removed = false;
    if settings.convert_to_jpeg {
        let target = staging_path(file, &settings.output_dir);
        backend
            .convert(&ConvertParams {
                source: file.path.clone(),
                output: target.clone(),
                quality: Quality::default(),
            })
            .map_err(image_error)?;
        tracing::debug!("converted {} to {}", file.path.display(), target.display());
        if settings.delete_original {
            remove_best_effort(&file.path, "original");
            original_removed = true;
        }
        working = target.clone();
        staged = Some(target);
    }

    let destination = naming::resolve_output_path(&working, &settings.output_dir, settings.naming);
    let mut payload = backend.load(&working).map_err(image_error)?;
    if settings.metadata == MetadataPolicy::Strip {
        payload.strip_metadata();
    }
    backend
        .save(
            &payload,
            &SaveParams {
                output: destination.clone(),
                recompress: compression_for(&working, settings.compression),
            },
        )
        .map_err(image_error)?;
    tracing::debug!("wrote {}", destination.display());

    if settings.delete_original && !original_removed {
        remove_best_effort(&file.path, "original");
    }
    if let Some(staged) = staged
        && staged != destination
    {
        remove_best_effort(&staged, "staged file");
    }

    Ok(FileOutcome {
        source: file.path.clone(),
        output: destination,
    })
}

/// Process every supported file in the input folder with `backend`.
pub fn run_with_backend(
    backend: &impl ImageBackend,
    settings: &Settings,
    events: Option<Sender<RunEvent>>,
) -> Result<RunSummary, ProcessError> {
    let started = Instant::now();

    if prepare_directories(settings)? {
        send(&events, RunEvent::InputDirCreated(settings.input_dir.clone()));
    }

    let inventory = inventory::scan(&settings.input_dir)?;
    send(
        &events,
        RunEvent::Inventory {
            files: inventory.files.len(),
            unsupported: inventory.unsupported(),
        },
    );

    let total = inventory.files.len();
    let mut outputs = Vec::with_capacity(total);
    for (i, file) in inventory.files.iter().enumerate() {
        let index = i + 1;
        let name = file.file_name().to_string_lossy().into_owned();
        send(
            &events,
            RunEvent::FileStarted {
                index,
                total,
                name: name.clone(),
            },
        );
        outputs.push(process_file(backend, file, settings)?);
        send(&events, RunEvent::FileFinished { index, total, name });
    }

    let elapsed = started.elapsed();
    send(
        &events,
        RunEvent::Finished {
            processed: outputs.len(),
            elapsed,
        },
    );
    Ok(RunSummary {
        inventory,
        outputs,
        elapsed,
    })
}

/// Load settings, resetting them and stopping on any problem.
fn load_or_reset(settings_path: &Path) -> Result<Settings, RunError> {
    match config::load_settings(settings_path) {
        Ok(settings) => Ok(settings),
        Err(source) => {
            tracing::warn!(
                "resetting {} to defaults: {source}",
                settings_path.display()
            );
            config::reset_settings(settings_path)?;
            Err(RunError::ConfigReset {
                path: settings_path.to_path_buf(),
                source,
            })
        }
    }
}

/// Full run with the production backend.
pub fn run(
    settings_path: &Path,
    events: Option<Sender<RunEvent>>,
) -> Result<RunSummary, RunError> {
    let settings = load_or_reset(settings_path)?;
    Ok(run_with_backend(&RustBackend::new(), &settings, events)?)
}

/// Validate settings and list what a run would do, without touching images.
pub fn check(settings_path: &Path) -> Result<CheckReport, RunError> {
    let settings = load_or_reset(settings_path)?;
    let input_created = prepare_directories(&settings)?;
    let inventory = inventory::scan(&settings.input_dir).map_err(ProcessError::from)?;
    let destinations = inventory
        .files
        .iter()
        .map(|file| FileOutcome {
            source: file.path.clone(),
            output: destination_for(file, &settings),
        })
        .collect();
    Ok(CheckReport {
        settings,
        input_created,
        inventory,
        destinations,
    })
}
