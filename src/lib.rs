//! Normalize a folder of photographs onto one output canvas size.
//!
//! - [`classify`] decides framing and sideways storage from orientation metadata
//! - [`planner`] turns that into rotate / crop / pad / scale decisions
//! - [`compositor`] applies a plan and writes an exactly canvas-sized image
//! - [`probe`] and [`batch`] feed files through that pipeline

pub mod batch;
pub mod classify;
pub mod compositor;
pub mod config;
pub mod error;
pub mod planner;
pub mod probe;

pub use batch::{run, BatchSummary, Outcome};
pub use classify::{classify, Classification, Position, Rotation, UNKNOWN_ORIENTATION};
pub use compositor::{compose, save_canvas};
pub use config::{Args, CanvasConfig, Settings};
pub use error::FitError;
pub use planner::{plan, TransformPlan};
pub use probe::{ImageMetadata, ProbeKind, ProbedFile};
