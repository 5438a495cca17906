use std::{env, time::Instant};

use fiberscan::detect::detect_ellipses_image;
use fiberscan::{core, ScanParams};
use image::ImageReader;
use log::LevelFilter;

/// Detect fiber cross-sections in an image and print the ellipse list.
///
/// Usage: `cargo run --example detect_fibers -- <image> [min_width]`
fn main() -> Result<(), Box<dyn std::error::Error>> {
    core::init_with_level(LevelFilter::Info)?;

    let mut args = env::args().skip(1);
    let path = args.next().ok_or("usage: detect_fibers <image> [min_width]")?;
    let min_width: f64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(20.0);

    let img = ImageReader::open(&path)?.decode()?.to_rgb8();
    let params = ScanParams::with_min_width(min_width);

    let started = Instant::now();
    let result = detect_ellipses_image(&img, &params)?;
    let elapsed = started.elapsed().as_secs_f64();

    println!(
        "{} fibers in {} ({:.2}s, mean color {:?})",
        result.detections.len(),
        path,
        elapsed,
        result.stats.mean
    );
    for (i, d) in result.detections.iter().enumerate() {
        println!(
            "#{i:3}  center ({:7.1}, {:7.1})  a {:6.1}  b {:6.1}  theta {:5.2}  score {:.2}",
            d.ellipse.cx, d.ellipse.cy, d.ellipse.a, d.ellipse.b, d.ellipse.theta, d.score
        );
    }
    Ok(())
}
