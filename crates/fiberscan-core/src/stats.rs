use serde::{Deserialize, Serialize};

use crate::color::ColorSample;
use crate::image::RgbImageView;

/// Per-channel mean and standard deviation over a whole pixel buffer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ImageStats {
    pub mean: ColorSample,
    pub stdev: ColorSample,
}

/// Contrast thresholds derived from the global standard deviation.
///
/// `high` gates seed acceptance, `mid` gates the cheap patch precheck and
/// `low` gates midpoint jumps during tracing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ToleranceBands {
    pub high: ColorSample,
    pub mid: ColorSample,
    pub low: ColorSample,
}

impl ToleranceBands {
    pub fn from_stats(stats: &ImageStats) -> Self {
        Self {
            high: stats.stdev * (2.0 / 8.0),
            mid: stats.stdev * (5.0 / 32.0),
            low: stats.stdev * (1.0 / 8.0),
        }
    }
}

/// Two-pass per-channel mean and standard deviation.
pub fn compute_stats(img: &RgbImageView<'_>) -> ImageStats {
    let n = (img.width * img.height) as f64;
    if n == 0.0 {
        return ImageStats {
            mean: ColorSample::ZERO,
            stdev: ColorSample::ZERO,
        };
    }

    let mut sum = [0.0f64; 3];
    for px in img.data.chunks_exact(3) {
        for c in 0..3 {
            sum[c] += px[c] as f64;
        }
    }
    let mean = ColorSample([sum[0] / n, sum[1] / n, sum[2] / n]);

    let mut var = [0.0f64; 3];
    for px in img.data.chunks_exact(3) {
        for c in 0..3 {
            let d = px[c] as f64 - mean.0[c];
            var[c] += d * d;
        }
    }
    let stdev = ColorSample([
        (var[0] / n).sqrt(),
        (var[1] / n).sqrt(),
        (var[2] / n).sqrt(),
    ]);

    ImageStats { mean, stdev }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_image_has_zero_stdev() {
        let img = RgbImage::filled(8, 8, [50, 100, 150]);
        let s = compute_stats(&img.view());
        assert_relative_eq!(s.mean.0[0], 50.0);
        assert_relative_eq!(s.mean.0[1], 100.0);
        assert_relative_eq!(s.mean.0[2], 150.0);
        assert_relative_eq!(s.stdev.0[0], 0.0);
    }

    #[test]
    fn two_tone_image_stats() {
        // Half 0, half 200 in every channel: mean 100, stdev 100.
        let img = RgbImage::from_fn(10, 2, |x, _| if x < 5 { [0; 3] } else { [200; 3] });
        let s = compute_stats(&img.view());
        assert_relative_eq!(s.mean.0[0], 100.0);
        assert_relative_eq!(s.stdev.0[0], 100.0);
    }

    #[test]
    fn stats_round_trip_through_serde() {
        let stats = ImageStats {
            mean: ColorSample([10.0, 20.0, 30.0]),
            stdev: ColorSample([1.0, 2.0, 3.0]),
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: ImageStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mean, stats.mean);
        assert_eq!(back.stdev, stats.stdev);
    }

    #[test]
    fn tolerance_bands_scale_with_stdev() {
        let stats = ImageStats {
            mean: ColorSample::ZERO,
            stdev: ColorSample([32.0, 32.0, 32.0]),
        };
        let bands = ToleranceBands::from_stats(&stats);
        assert_relative_eq!(bands.high.0[0], 8.0);
        assert_relative_eq!(bands.mid.0[0], 5.0);
        assert_relative_eq!(bands.low.0[0], 4.0);
    }
}
