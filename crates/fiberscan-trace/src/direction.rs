//! Angular contrast estimation on a patch.
//!
//! The estimator splits the patch by a line through its center and measures
//! the per-channel lightness difference between the two half-planes. An
//! 8-step interval-halving search finds the split angle where the difference
//! changes sign; the boundary tangent is that angle plus π/2.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use fiberscan_core::{ColorSample, PatchView};

/// Polar angle of an integer offset from the patch center, in [0, 2π).
#[inline]
fn polar_angle(i: i32, j: i32) -> f64 {
    (j as f64).atan2(i as f64).rem_euclid(TAU)
}

/// Per-channel lightness difference between the half-plane of polar angles
/// `[theta, theta + π)` and its complement.
///
/// Pixels near the dividing line contribute fractionally to both sides: each
/// pixel is treated as a disc whose effective radius oscillates between 0.5
/// and ~0.707 with 2θ, and coverage ramps linearly with the distance from
/// the line. The center row `j = 0` is excluded from both sides.
pub fn split_contrast(patch: &PatchView<'_>, theta: f64) -> ColorSample {
    let theta = theta + 1e-3;
    let r_pixel = 0.5 + 0.2071 * (2.0 * theta).sin();

    let mut side1 = [0.0f64; 3];
    let mut side2 = [0.0f64; 3];
    let mut n1 = 0.0f64;
    let mut n2 = 0.0f64;

    for i in patch.lo()..patch.hi() {
        for j in patch.lo()..patch.hi() {
            if j == 0 {
                continue;
            }
            let d = (polar_angle(i, j) - theta).rem_euclid(TAU);
            let dist = f64::hypot(i as f64, j as f64) * d.tan().abs();
            let px = patch.at(i, j);

            // Coverage fraction on the pixel's own side of the line.
            let (own, other) = if dist < r_pixel {
                let f = dist / (2.0 * r_pixel) + 0.5;
                (f, 1.0 - f)
            } else {
                (1.0, 0.0)
            };

            if d < PI {
                for c in 0..3 {
                    side1[c] += px.0[c] * own;
                    side2[c] += px.0[c] * other;
                }
                n1 += own;
                n2 += other;
            } else {
                for c in 0..3 {
                    side2[c] += px.0[c] * own;
                    side1[c] += px.0[c] * other;
                }
                n2 += own;
                n1 += other;
            }
        }
    }

    let n1 = n1.max(1e-9);
    let n2 = n2.max(1e-9);
    ColorSample([
        side1[0] / n1 - side2[0] / n2,
        side1[1] / n1 - side2[1] / n2,
        side1[2] / n1 - side2[2] / n2,
    ])
}

/// Boundary tangent angle at the patch center, in radians.
///
/// Interval-halving search over the split angle: eight iterations starting
/// from −π/2 with half-width π, stepping toward the sign change of the
/// aggregate lightness difference. Angular resolution is bounded by π/256.
pub fn best_contrast_angle(patch: &PatchView<'_>) -> f64 {
    let mut half = PI;
    let mut trial = -FRAC_PI_2;
    for _ in 0..8 {
        let diff = split_contrast(patch, trial);
        half *= 0.5;
        if diff.channel_sum() > 0.0 {
            trial -= half;
        } else {
            trial += half;
        }
    }
    trial + FRAC_PI_2
}

/// Tangent angle plus the lightness difference measured at that angle.
pub fn probe(patch: &PatchView<'_>) -> (f64, ColorSample) {
    let theta = best_contrast_angle(patch);
    let diff = split_contrast(patch, theta);
    (theta, diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiberscan_core::RgbImage;

    fn edge_patch(bright: impl Fn(usize, usize) -> bool) -> RgbImage {
        RgbImage::from_fn(9, 9, |x, y| if bright(x, y) { [220; 3] } else { [20; 3] })
    }

    #[test]
    fn horizontal_edge_gives_horizontal_tangent() {
        // Bright below the center row: the tangent runs along +x.
        let img = edge_patch(|_, y| y > 4);
        let patch = PatchView::centered(img.view(), 4, 4, 7).unwrap();
        let t = best_contrast_angle(&patch);
        assert!(t.sin().abs() < 0.1, "tangent should be near-horizontal, got {t}");
    }

    #[test]
    fn vertical_edge_gives_vertical_tangent() {
        // Bright to the right of the center column.
        let img = edge_patch(|x, _| x > 4);
        let patch = PatchView::centered(img.view(), 4, 4, 7).unwrap();
        let t = best_contrast_angle(&patch);
        assert!(t.cos().abs() < 0.1, "tangent should be near-vertical, got {t}");
    }

    #[test]
    fn flat_patch_has_no_aggregate_contrast() {
        let img = RgbImage::filled(9, 9, [128; 3]);
        let patch = PatchView::centered(img.view(), 4, 4, 7).unwrap();
        let (_, diff) = probe(&patch);
        assert!(diff.abs_sum() < 1e-6);
    }

    #[test]
    fn split_contrast_sign_flips_across_the_edge() {
        let img = edge_patch(|_, y| y > 4);
        let patch = PatchView::centered(img.view(), 4, 4, 7).unwrap();
        // Split along x: side1 is the lower half-plane (bright).
        let d0 = split_contrast(&patch, 0.0);
        // Split rotated by π: sides swap.
        let d1 = split_contrast(&patch, PI);
        assert!(d0.channel_sum() > 0.0);
        assert!(d1.channel_sum() < 0.0);
    }
}
