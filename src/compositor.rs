//! Applies a [`TransformPlan`] to pixels and writes the result.

use crate::classify::Rotation;
use crate::config::CanvasConfig;
use crate::error::FitError;
use crate::planner::TransformPlan;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Run the plan on `source` and place the result on a canvas of exactly
/// `config.canvas_width()` x `config.canvas_height()` pixels.
pub fn compose(source: &DynamicImage, plan: &TransformPlan, config: &CanvasConfig) -> RgbaImage {
    let mut current = source.to_rgba8();

    current = match plan.rotate {
        Rotation::None => current,
        Rotation::ClockwiseQuarter => imageops::rotate90(&current),
        Rotation::CounterClockwiseQuarter => imageops::rotate270(&current),
    };

    if plan.center_crop {
        current = crop_center(&current, plan.target_width, plan.target_height);
    }

    if plan.fill_sides {
        current = paste_center(&current, plan.target_width, plan.target_height);
    }

    if plan.scale_down {
        current = scale_to_width(&current, config.canvas_width());
    }

    // Always anchored top-left; anything past the canvas edge is dropped.
    let mut canvas: RgbaImage =
        ImageBuffer::from_pixel(config.canvas_width(), config.canvas_height(), TRANSPARENT);
    imageops::replace(&mut canvas, &current, 0, 0);
    canvas
}

/// Cut a `width` x `height` window from the middle of `image`, clamped to
/// its bounds.
fn crop_center(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (src_width, src_height) = image.dimensions();
    let width = width.min(src_width);
    let height = height.min(src_height);
    let x = (src_width - width) / 2;
    let y = (src_height - height) / 2;
    imageops::crop_imm(image, x, y, width, height).to_image()
}

/// Center `image` on a transparent `width` x `height` background.
fn paste_center(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut background: RgbaImage = ImageBuffer::from_pixel(width, height, TRANSPARENT);
    let x = (i64::from(width) - i64::from(image.width())) / 2;
    let y = (i64::from(height) - i64::from(image.height())) / 2;
    imageops::replace(&mut background, image, x, y);
    background
}

fn scale_to_width(image: &RgbaImage, width: u32) -> RgbaImage {
    let (src_width, src_height) = image.dimensions();
    let height = (src_height as f64 * width as f64 / src_width as f64)
        .round()
        .max(1.0) as u32;
    imageops::resize(image, width, height, FilterType::Lanczos3)
}

/// Encode `canvas` according to the extension of `output_path`.
///
/// JPEG has no alpha channel, so transparent padding comes out black.
pub fn save_canvas(canvas: RgbaImage, output_path: &Path, jpeg_quality: u8) -> Result<(), FitError> {
    let out_ext = output_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let save_err = |source| FitError::Save {
        path: output_path.to_path_buf(),
        source,
    };

    match out_ext.as_str() {
        "png" => canvas.save(output_path).map_err(save_err),
        "jpg" | "jpeg" => {
            let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
            let mut out_file = std::fs::File::create(output_path)
                .map_err(|source| FitError::io(output_path, source))?;
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out_file, jpeg_quality);
            encoder.encode_image(&rgb).map_err(save_err)
        }
        _ => DynamicImage::ImageRgba8(canvas)
            .save(output_path)
            .map_err(save_err),
    }
}
