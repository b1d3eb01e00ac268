//! Transformation planning.
//!
//! Decides which canvas operations a picture needs and the working size
//! they aim for. Pure arithmetic; no pixels are touched here.

use crate::classify::{Classification, Position, Rotation};
use crate::config::CanvasConfig;
use crate::probe::ImageMetadata;

/// Ordered operations for one picture. The compositor always runs them as
/// rotate, center-crop, fill-sides, scale-down.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransformPlan {
    pub rotate: Rotation,
    pub center_crop: bool,
    pub fill_sides: bool,
    pub scale_down: bool,
    pub target_width: u32,
    pub target_height: u32,
}

impl TransformPlan {
    /// True when no operation runs before the final canvas paste.
    pub fn is_noop(&self) -> bool {
        self.rotate == Rotation::None && !self.center_crop && !self.fill_sides && !self.scale_down
    }
}

/// Round to the nearest whole pixel, halves away from zero, never below 1.
fn round_px(value: f64) -> u32 {
    value.round().max(1.0) as u32
}

/// Plan the operations that fit one picture onto the configured canvas.
pub fn plan(
    classification: &Classification,
    metadata: &ImageMetadata,
    config: &CanvasConfig,
) -> TransformPlan {
    let (raw_width, raw_height) = (metadata.raw_width, metadata.raw_height);
    let ratio = config.base_ratio();

    let (mut plan, working_width) = match classification.position {
        Position::Vertical => {
            // Sized against the pre-rotation width, which becomes the
            // upright height.
            let plan = TransformPlan {
                rotate: classification.rotation,
                center_crop: false,
                fill_sides: false,
                scale_down: false,
                target_width: round_px(raw_width as f64 * ratio),
                target_height: raw_width,
            };
            let working_width = if classification.rotation == Rotation::None {
                raw_width
            } else {
                raw_height
            };
            (plan, working_width)
        }
        Position::Horizontal if config.crop_wide_pictures() => {
            // Narrower than the canvas ratio: nothing to chop.
            let target_width = round_px(raw_height as f64 * ratio).min(raw_width);
            let plan = TransformPlan {
                rotate: Rotation::None,
                center_crop: target_width < raw_width,
                fill_sides: false,
                scale_down: false,
                target_width,
                target_height: raw_height,
            };
            (plan, target_width)
        }
        Position::Horizontal => {
            let target_height = round_px(raw_width as f64 / ratio);
            let plan = TransformPlan {
                rotate: Rotation::None,
                center_crop: false,
                fill_sides: target_height != raw_height,
                scale_down: false,
                target_width: raw_width,
                target_height,
            };
            (plan, raw_width)
        }
    };

    plan.scale_down = working_width as f64 > config.base_width();
    plan
}
