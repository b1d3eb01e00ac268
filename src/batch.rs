//! Batch driver: enumerate, probe, then classify/plan/compose each file on
//! one worker thread, in the order the metadata arrives.

use crate::classify::classify;
use crate::compositor::{compose, save_canvas};
use crate::config::{CanvasConfig, Settings};
use crate::error::FitError;
use crate::planner::plan;
use crate::probe::{self, ProbedFile, Records};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// What happened to one file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Rotated, cropped, padded and/or scaled onto a new canvas.
    Composited,
    /// Already canvas-shaped; copied byte for byte.
    Copied,
}

#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub composited: usize,
    pub copied: usize,
    pub total_duration: Duration,
    pub fastest: Option<(String, Duration)>,
    pub slowest: Option<(String, Duration)>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.composited + self.copied
    }

    fn record(&mut self, filename: String, outcome: Outcome, elapsed: Duration) {
        match outcome {
            Outcome::Composited => self.composited += 1,
            Outcome::Copied => self.copied += 1,
        }
        self.total_duration += elapsed;
        if self.fastest.as_ref().map(|(_, d)| elapsed < *d).unwrap_or(true) {
            self.fastest = Some((filename.clone(), elapsed));
        }
        if self.slowest.as_ref().map(|(_, d)| elapsed > *d).unwrap_or(true) {
            self.slowest = Some((filename, elapsed));
        }
    }
}

/// Everything the worker needs, moved onto its thread.
struct Job {
    canvas: CanvasConfig,
    destination: PathBuf,
    jpeg_quality: u8,
}

pub fn run(settings: &Settings) -> Result<BatchSummary, FitError> {
    let files = discover(&settings.source)?;
    info!(
        "Found {} image(s) under {}",
        files.len(),
        settings.source.display()
    );
    if files.is_empty() {
        return Ok(BatchSummary::default());
    }

    std::fs::create_dir_all(&settings.destination)
        .map_err(|source| FitError::io(&settings.destination, source))?;

    let (records, collaborator) = probe::open(settings.probe, files)?;
    let job = Job {
        canvas: settings.canvas,
        destination: settings.destination.clone(),
        jpeg_quality: settings.jpeg_quality,
    };

    let worker = thread::Builder::new()
        .name("compositor".to_string())
        .spawn(move || process_all(records, &job))
        .map_err(|source| FitError::io("compositor thread", source))?;

    // Block until the worker has drained the stream.
    let outcome = worker.join().unwrap_or(Err(FitError::WorkerPanicked));

    match collaborator {
        Some(collaborator) => {
            let finished = collaborator.finish(outcome.is_ok());
            settle(outcome, finished)
        }
        None => outcome,
    }
}

/// Combine the worker's result with the collaborator shutdown. A worker
/// failure always wins; a cleanup error after it is only logged.
fn settle(
    outcome: Result<BatchSummary, FitError>,
    finished: Result<(), FitError>,
) -> Result<BatchSummary, FitError> {
    match (outcome, finished) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            warn!("Collaborator cleanup failed after batch error: {cleanup}");
            Err(e)
        }
    }
}

/// Image files under `source`, recursively, in file-name order.
pub fn discover(source: &Path) -> Result<Vec<PathBuf>, FitError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn process_all(records: Records, job: &Job) -> Result<BatchSummary, FitError> {
    let mut summary = BatchSummary::default();
    for record in records {
        let probed = record?;
        let filename = file_name(&probed.path)?;
        let start = Instant::now();
        let outcome = process_file(&probed, &job.destination.join(&filename), job)?;
        let elapsed = start.elapsed();
        info!(
            "Finished {} ({:?}) in {:.2} seconds",
            filename,
            outcome,
            elapsed.as_secs_f64()
        );
        summary.record(filename, outcome, elapsed);
    }
    Ok(summary)
}

fn process_file(probed: &ProbedFile, output_path: &Path, job: &Job) -> Result<Outcome, FitError> {
    let metadata = &probed.metadata;
    let classification = classify(
        &metadata.orientation,
        metadata.raw_width,
        metadata.raw_height,
    );
    let plan = plan(&classification, metadata, &job.canvas);

    info!(
        "Processing {}: size={}x{} orientation={} position={:?} rotated={} ratio={:.6} new size={}x{}",
        probed.path.display(),
        metadata.raw_width,
        metadata.raw_height,
        metadata.orientation,
        classification.position,
        classification.rotated,
        metadata.raw_width as f64 / metadata.raw_height as f64,
        plan.target_width,
        plan.target_height,
    );
    info!(
        "  operations: rotate={:?} center_crop={} fill_sides={} scale_down={}",
        plan.rotate, plan.center_crop, plan.fill_sides, plan.scale_down
    );

    // A file is only passed through when it already is the canvas.
    let canvas_sized = (metadata.raw_width, metadata.raw_height)
        == (job.canvas.canvas_width(), job.canvas.canvas_height());
    if plan.is_noop() && canvas_sized {
        info!("  no changes required, copying {}", probed.path.display());
        std::fs::copy(&probed.path, output_path)
            .map_err(|source| FitError::io(output_path, source))?;
        return Ok(Outcome::Copied);
    }

    let src = image::open(&probed.path).map_err(|source| FitError::Open {
        path: probed.path.clone(),
        source,
    })?;
    let canvas = compose(&src, &plan, &job.canvas);
    save_canvas(canvas, output_path, job.jpeg_quality)?;
    Ok(Outcome::Composited)
}

fn file_name(path: &Path) -> Result<String, FitError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| FitError::MissingFilePath {
            line: path.display().to_string(),
        })
}
