//! Directory-tree batch conversion

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use geokmz_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::naming::{is_geotiff, kmz_path_for};
use crate::parallel::ProcessingMode;
use crate::pipeline::{convert_file, ConversionReport, ConvertOptions};

/// One raster to convert and where its archive goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionTask {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// A file the batch gave up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub input: PathBuf,
    /// Error category (`Error::kind`)
    pub kind: &'static str,
    pub reason: String,
}

/// Per-file result passed to the progress callback
#[derive(Debug)]
pub enum TaskOutcome<'a> {
    Converted(&'a ConversionReport),
    Failed(&'a BatchFailure),
}

/// Result of a whole batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub converted: Vec<ConversionReport>,
    pub failed: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Collect every `.tif`/`.tiff` under `input_root`, mirroring its
/// directory tree under `output_root`.
///
/// Output directories are created here, including ones holding no
/// rasters. Failing to create `output_root` itself is an error; a
/// subdirectory that cannot be created or read is logged and skipped.
pub fn gather_tasks(input_root: &Path, output_root: &Path) -> Result<Vec<ConversionTask>> {
    if !input_root.is_dir() {
        return Err(Error::InvalidParameter {
            name: "input_root",
            value: input_root.display().to_string(),
            reason: "not a directory".into(),
        });
    }
    std::fs::create_dir_all(output_root).map_err(|e| {
        Error::Packaging(format!(
            "cannot create output root {}: {}",
            output_root.display(),
            e
        ))
    })?;

    let mut tasks = Vec::new();
    for entry in WalkDir::new(input_root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let Ok(rel) = entry.path().strip_prefix(input_root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            let out_dir = output_root.join(rel);
            if let Err(e) = std::fs::create_dir_all(&out_dir) {
                warn!("Cannot create {}: {}", out_dir.display(), e);
            }
            continue;
        }

        if entry.file_type().is_file() && is_geotiff(entry.path()) {
            let out_dir = rel.parent().map_or_else(|| output_root.to_path_buf(), |p| output_root.join(p));
            tasks.push(ConversionTask {
                input: entry.path().to_path_buf(),
                output: kmz_path_for(entry.path(), &out_dir),
            });
        }
    }

    debug!("Found {} GeoTIFF files under {}", tasks.len(), input_root.display());
    Ok(tasks)
}

/// Convert every task, never stopping on a per-file error.
///
/// `on_progress` is called once per finished file with the number of
/// files finished so far; with a parallel mode it runs on worker threads
/// and calls arrive in completion order.
pub fn run_batch<F>(
    tasks: Vec<ConversionTask>,
    options: &ConvertOptions,
    mode: ProcessingMode,
    on_progress: F,
) -> Result<BatchSummary>
where
    F: Fn(usize, &ConversionTask, TaskOutcome<'_>) + Sync + Send,
{
    let done = AtomicUsize::new(0);

    let results = mode.map(tasks, |task| {
        let result = convert_file(&task.input, &task.output, options).map_err(|e| {
            warn!("{}: FAILED: {}", task.input.display(), e);
            BatchFailure {
                input: task.input.clone(),
                kind: e.kind(),
                reason: e.to_string(),
            }
        });
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        match &result {
            Ok(report) => on_progress(finished, &task, TaskOutcome::Converted(report)),
            Err(failure) => on_progress(finished, &task, TaskOutcome::Failed(failure)),
        }
        result
    })?;

    let mut summary = BatchSummary::default();
    for result in results {
        match result {
            Ok(report) => summary.converted.push(report),
            Err(failure) => summary.failed.push(failure),
        }
    }
    Ok(summary)
}

/// [`gather_tasks`] followed by [`run_batch`]
pub fn convert_tree<F>(
    input_root: &Path,
    output_root: &Path,
    options: &ConvertOptions,
    mode: ProcessingMode,
    on_progress: F,
) -> Result<BatchSummary>
where
    F: Fn(usize, &ConversionTask, TaskOutcome<'_>) + Sync + Send,
{
    let tasks = gather_tasks(input_root, output_root)?;
    run_batch(tasks, options, mode, on_progress)
}
