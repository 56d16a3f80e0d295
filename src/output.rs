//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! Found 3 files, 1 unsupported file
//! (1/2) - IMG_0001.jpg - processing...
//! (1/2) - IMG_0001.jpg - done
//! (2/2) - photo.HEIC - processing...
//! (2/2) - photo.HEIC - done
//! Processed 2 images in 0.4s
//! ```
//!
//! ## Check
//!
//! ```text
//! Settings: /photos/settings.json
//!     Input: /photos/INPUT
//!     Output: /photos/OUTPUT
//!     Names: hashed
//!     Metadata: strip
//!     Convert to JPEG: no
//!     Compress JPEG: no
//!     Delete originals: no
//! Found 3 files, 1 unsupported file
//! IMG_0001.jpg → 3f1c….jpg
//! photo.HEIC → 55c6….HEIC
//! ```
//!
//! # Architecture
//!
//! Every line has a `format_*` function (returns `String` or `Vec<String>`)
//! for testability and, where `main` needs it, a `print_*` wrapper that
//! writes to stdout. Format functions are pure: no I/O, no side effects.

use crate::config::{CompressionPolicy, MetadataPolicy, NamingPolicy, Settings};
use crate::process::{CheckReport, RunEvent};
use std::path::Path;
use std::time::Duration;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `Found N files, M unsupported file(s)`; N counts every entry examined.
pub fn format_inventory_summary(total: usize, unsupported: usize) -> String {
    let noun = if unsupported == 1 { "file" } else { "files" };
    format!("Found {total} files, {unsupported} unsupported {noun}")
}

pub fn format_progress(index: usize, total: usize, name: &str, status: &str) -> String {
    format!("({index}/{total}) - {name} - {status}")
}

/// Elapsed time rounded to one decimal.
pub fn format_run_summary(processed: usize, elapsed: Duration) -> String {
    format!("Processed {processed} images in {:.1}s", elapsed.as_secs_f64())
}

/// Display lines for one run event.
pub fn format_run_event(event: &RunEvent) -> Vec<String> {
    match event {
        RunEvent::InputDirCreated(path) => vec![format!(
            "Input folder {} was missing and has been created; add images to it and run again",
            path.display()
        )],
        RunEvent::Inventory { files, unsupported } => {
            vec![format_inventory_summary(files + unsupported, *unsupported)]
        }
        RunEvent::FileStarted { index, total, name } => {
            vec![format_progress(*index, *total, name, "processing...")]
        }
        RunEvent::FileFinished { index, total, name } => {
            vec![format_progress(*index, *total, name, "done")]
        }
        RunEvent::Finished { processed, elapsed } => {
            vec![format_run_summary(*processed, *elapsed)]
        }
    }
}

pub fn format_settings(settings: &Settings, settings_path: &Path) -> Vec<String> {
    vec![
        format!("Settings: {}", settings_path.display()),
        format!("    Input: {}", settings.input_dir.display()),
        format!("    Output: {}", settings.output_dir.display()),
        format!(
            "    Names: {}",
            match settings.naming {
                NamingPolicy::Hashed => "hashed",
                NamingPolicy::Original => "original",
            }
        ),
        format!(
            "    Metadata: {}",
            match settings.metadata {
                MetadataPolicy::Strip => "strip",
                MetadataPolicy::Preserve => "preserve",
            }
        ),
        format!("    Convert to JPEG: {}", yes_no(settings.convert_to_jpeg)),
        format!(
            "    Compress JPEG: {}",
            yes_no(settings.compression == CompressionPolicy::WebLow)
        ),
        format!("    Delete originals: {}", yes_no(settings.delete_original)),
    ]
}

/// Settings, inventory summary and one `source → output` line per file.
pub fn format_check_report(report: &CheckReport, settings_path: &Path) -> Vec<String> {
    let mut lines = format_settings(&report.settings, settings_path);
    if report.input_created {
        lines.extend(format_run_event(&RunEvent::InputDirCreated(
            report.settings.input_dir.clone(),
        )));
    }
    lines.push(format_inventory_summary(
        report.inventory.total_entries,
        report.inventory.unsupported(),
    ));
    for outcome in &report.destinations {
        lines.push(format!(
            "{} \u{2192} {}",
            file_name(&outcome.source),
            file_name(&outcome.output)
        ));
    }
    lines
}

pub fn print_check_report(report: &CheckReport, settings_path: &Path) {
    for line in format_check_report(report, settings_path) {
        println!("{}", line);
    }
}
