use crate::error::FitError;
use crate::probe::ProbeKind;
use clap::Parser;
use std::path::PathBuf;

/// Fit every photo in a folder onto a canvas of the same size.
#[derive(Parser, Debug)]
#[command(name = "canvas_fitter")]
#[command(about = "Normalize a folder of photos to one output canvas size")]
pub struct Args {
    /// (Required) Full path of the source images to transform
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// (Required) Full path where the transformed images will be created
    #[arg(long)]
    pub destination: Option<PathBuf>,

    /// Width of the transformed images
    #[arg(long = "dst-width", default_value_t = 800.0)]
    pub dst_width: f64,

    /// Height of the transformed images
    #[arg(long = "dst-height", default_value_t = 600.0)]
    pub dst_height: f64,

    /// Crop wide pictures to the canvas ratio instead of padding them
    #[arg(long = "crop_wide_pics", visible_alias = "crop-wide-pics")]
    pub crop_wide_pics: bool,

    /// Where width, height and orientation come from
    #[arg(long, value_enum, default_value_t = ProbeKind::File)]
    pub probe: ProbeKind,

    /// JPEG output quality (1–100)
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

/// Target canvas geometry and crop policy. Built once per run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasConfig {
    base_width: f64,
    base_height: f64,
    base_ratio: f64,
    crop_wide_pictures: bool,
}

impl CanvasConfig {
    pub fn new(
        base_width: f64,
        base_height: f64,
        crop_wide_pictures: bool,
    ) -> Result<Self, FitError> {
        // The canvas is allocated at the truncated size, so anything below
        // one whole pixel is unusable.
        if !(base_width >= 1.0 && base_height >= 1.0)
            || !base_width.is_finite()
            || !base_height.is_finite()
        {
            return Err(FitError::InvalidCanvas {
                width: base_width,
                height: base_height,
            });
        }
        Ok(Self {
            base_width,
            base_height,
            base_ratio: base_width / base_height,
            crop_wide_pictures,
        })
    }

    pub fn base_width(&self) -> f64 {
        self.base_width
    }

    pub fn base_height(&self) -> f64 {
        self.base_height
    }

    pub fn base_ratio(&self) -> f64 {
        self.base_ratio
    }

    pub fn crop_wide_pictures(&self) -> bool {
        self.crop_wide_pictures
    }

    /// Width in pixels of the final canvas.
    pub fn canvas_width(&self) -> u32 {
        self.base_width as u32
    }

    /// Height in pixels of the final canvas.
    pub fn canvas_height(&self) -> u32 {
        self.base_height as u32
    }
}

/// Validated run settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub canvas: CanvasConfig,
    pub probe: ProbeKind,
    pub jpeg_quality: u8,
}

impl Settings {
    pub fn from_args(args: &Args) -> Result<Self, FitError> {
        let source = args.source.clone().ok_or(FitError::MissingSource)?;
        let destination = args
            .destination
            .clone()
            .ok_or(FitError::MissingDestination)?;
        let canvas = CanvasConfig::new(args.dst_width, args.dst_height, args.crop_wide_pics)?;

        Ok(Self {
            source,
            destination,
            canvas,
            probe: args.probe,
            jpeg_quality: args.jpeg_quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("canvas_fitter").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_a_4_3_canvas() {
        let args = parse(&["--source", "/in", "--destination", "/out"]);
        let settings = Settings::from_args(&args).unwrap();

        assert_eq!(settings.canvas.canvas_width(), 800);
        assert_eq!(settings.canvas.canvas_height(), 600);
        assert!((settings.canvas.base_ratio() - 4.0 / 3.0).abs() < 1e-12);
        assert!(!settings.canvas.crop_wide_pictures());
        assert_eq!(settings.probe, ProbeKind::File);
        assert_eq!(settings.jpeg_quality, 95);
    }

    #[test]
    fn crop_flag_keeps_its_underscore_spelling() {
        let args = parse(&[
            "--source",
            "/in",
            "--destination",
            "/out",
            "--crop_wide_pics",
            "--dst-width",
            "1024",
            "--dst-height",
            "768",
            "--probe",
            "exif",
        ]);
        let settings = Settings::from_args(&args).unwrap();

        assert!(settings.canvas.crop_wide_pictures());
        assert_eq!(settings.canvas.canvas_width(), 1024);
        assert_eq!(settings.probe, ProbeKind::Exif);

        let args = parse(&["--crop-wide-pics"]);
        assert!(args.crop_wide_pics);
    }

    #[test]
    fn missing_paths_are_rejected() {
        let args = parse(&["--destination", "/out"]);
        assert!(matches!(
            Settings::from_args(&args),
            Err(FitError::MissingSource)
        ));

        let args = parse(&["--source", "/in"]);
        assert!(matches!(
            Settings::from_args(&args),
            Err(FitError::MissingDestination)
        ));
    }

    #[test]
    fn sub_pixel_canvas_is_rejected() {
        assert!(CanvasConfig::new(0.5, 600.0, false).is_err());
        assert!(CanvasConfig::new(800.0, 0.0, false).is_err());
        assert!(CanvasConfig::new(f64::NAN, 600.0, false).is_err());
        assert!(CanvasConfig::new(f64::INFINITY, 600.0, false).is_err());
        assert!(CanvasConfig::new(800.5, 600.9, false).is_ok());
    }
}
