//! Error type shared by every stage of a batch run.
//!
//! Nothing here is retried: the first error of any kind stops the batch.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FitError {
    // Configuration
    #[error("Missing flag and value: --source /full/path/to/source/image/files")]
    MissingSource,

    #[error("Missing flag and value: --destination /full/path/to/destination/image/files")]
    MissingDestination,

    #[error("Canvas must be at least 1x1 pixels, got {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },

    // Metadata
    #[error("No WIDTHxHEIGHT token in metadata line: {line}")]
    MissingDimensions { line: String },

    #[error("Invalid dimension '{token}' in metadata line: {line}")]
    InvalidDimension { token: String, line: String },

    #[error("No image file path in metadata line: {line}")]
    MissingFilePath { line: String },

    #[error("Failed to read dimensions of '{}': {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    // Collaborator process
    #[error("Failed to start '{program}': {source}")]
    ProbeSpawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read '{program}' output: {source}")]
    ProbeOutput {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ProbeFailed {
        program: &'static str,
        status: std::process::ExitStatus,
    },

    // Files
    #[error("Failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to open image '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to save image '{}': {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compositor worker panicked")]
    WorkerPanicked,
}

impl FitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
