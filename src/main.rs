//! Canvas fitter: every photo in a folder comes out at the same width x height.

use anyhow::Context;
use canvas_fitter::{run, Args, BatchSummary, Settings};
use clap::Parser;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    print_config(&args);
    let settings = Settings::from_args(&args)?;

    let main_start = Instant::now();
    let summary = run(&settings).with_context(|| {
        format!(
            "batch from {} to {} aborted",
            settings.source.display(),
            settings.destination.display()
        )
    })?;

    println!(
        "\nTotal execution time: {:.2} seconds",
        main_start.elapsed().as_secs_f64()
    );
    print_summary(&summary);
    Ok(())
}

fn print_config(args: &Args) {
    println!("\n=== Configuration ===");
    println!("crop_wide_pics: {}", args.crop_wide_pics);
    println!(
        "source: {}",
        args.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );
    println!(
        "destination: {}",
        args.destination
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );
    println!("dst-width: {}", args.dst_width);
    println!("dst-height: {}", args.dst_height);
    println!("probe: {:?}", args.probe);
    println!("JPEG quality: {}", args.jpeg_quality);
    println!("==================\n");
}

fn print_summary(summary: &BatchSummary) {
    println!("\n📊 === Processing Summary ===");
    println!("✅ Images composited: {}", summary.composited);
    println!("📄 Images copied unchanged: {}", summary.copied);
    if summary.processed() > 0 {
        let avg = summary.total_duration.as_secs_f64() / summary.processed() as f64;
        println!("⏱️  Average processing time: {:.2} seconds", avg);
        if let Some((name, d)) = &summary.fastest {
            println!("🚀 Fastest image: {} ({:.2} seconds)", name, d.as_secs_f64());
        }
        if let Some((name, d)) = &summary.slowest {
            println!("🐢 Slowest image: {} ({:.2} seconds)", name, d.as_secs_f64());
        }
    }
    println!();
}
