//! Best-contrast candidate search in a small neighborhood.

use nalgebra::Point2;

use fiberscan_core::{ColorSample, PatchView, RgbImageView};

use crate::direction::probe;

/// One accepted boundary candidate: position, tangent angle, and the
/// lightness-difference vector measured there.
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub point: Point2<f64>,
    pub theta: f64,
    pub contrast: ColorSample,
}

/// Scan a `(2r+1)²` offset grid around `(cx, cy)` for the offset with the
/// strongest contrast signal.
///
/// The grid is subsampled with stride `1 + r/3` to keep cost bounded.
/// Offsets whose patch would leave the image are skipped. When `prev` is
/// set, a candidate is only admitted if it sits farther than `skip` from
/// `prev` and the pixel at their midpoint is not darker than the global
/// mean by more than `tol` — this rejects jumps across a genuinely
/// different region.
///
/// Returns `None` when no offset qualifies, which callers treat as "no
/// valid next boundary point".
#[allow(clippy::too_many_arguments)]
pub fn best_in_region(
    img: RgbImageView<'_>,
    box_w: u32,
    cx: f64,
    cy: f64,
    r: i32,
    skip: f64,
    prev: Option<Point2<f64>>,
    mean: ColorSample,
    tol: ColorSample,
) -> Option<Candidate> {
    let step = (1 + r / 3).max(1) as usize;
    let skip_sq = skip * skip;

    let mut best: Option<Candidate> = None;
    let mut best_contrast = ColorSample::ZERO;

    for j in (-r..=r).step_by(step) {
        for i in (-r..=r).step_by(step) {
            let px = cx + i as f64;
            let py = cy + j as f64;

            let Some(patch) = PatchView::centered(img, px as i32, py as i32, box_w) else {
                continue;
            };

            let good = match prev {
                None => true,
                Some(p) => {
                    let dx = p.x - px;
                    let dy = p.y - py;
                    if dx * dx + dy * dy <= skip_sq {
                        false
                    } else {
                        let mid = img.sample(
                            ((p.x + px) / 2.0) as i32,
                            ((p.y + py) / 2.0) as i32,
                        );
                        !(mean - mid).exceeds(ColorSample::ZERO, tol)
                    }
                }
            };
            if !good {
                continue;
            }

            let (theta, contrast) = probe(&patch);
            if contrast.abs_exceeds(best_contrast) {
                best_contrast = contrast;
                best = Some(Candidate {
                    point: Point2::new(px, py),
                    theta,
                    contrast,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiberscan_core::RgbImage;

    fn half_bright() -> RgbImage {
        RgbImage::from_fn(32, 32, |_, y| if y >= 16 { [220; 3] } else { [20; 3] })
    }

    #[test]
    fn finds_the_edge_row() {
        let img = half_bright();
        let c = best_in_region(
            img.view(),
            7,
            15.0,
            15.0,
            2,
            2.4,
            None,
            ColorSample([120.0; 3]),
            ColorSample([10.0; 3]),
        )
        .expect("edge should produce a candidate");
        // The strongest contrast offset sits on the brightness boundary.
        assert!((c.point.y - 16.0).abs() <= 2.0);
        assert!(c.contrast.abs_sum() > 100.0);
    }

    #[test]
    fn flat_region_yields_nothing() {
        let img = RgbImage::filled(32, 32, [128; 3]);
        let c = best_in_region(
            img.view(),
            7,
            15.0,
            15.0,
            2,
            2.4,
            None,
            ColorSample([128.0; 3]),
            ColorSample([10.0; 3]),
        );
        assert!(c.is_none());
    }

    #[test]
    fn rejects_candidates_too_close_to_previous() {
        let img = half_bright();
        // Every offset within radius 2 lies closer than `skip` to prev.
        let c = best_in_region(
            img.view(),
            7,
            15.0,
            16.0,
            2,
            20.0,
            Some(Point2::new(15.0, 16.0)),
            ColorSample([120.0; 3]),
            ColorSample([10.0; 3]),
        );
        assert!(c.is_none());
    }

    #[test]
    fn rejects_jumps_across_a_dark_gap() {
        // Two bright bands separated by a black gap; prev sits on the left
        // band, candidates on the right one. The midpoint falls in the gap,
        // far darker than the mean, so nothing qualifies.
        let img = RgbImage::from_fn(48, 16, |x, _| {
            if (28..36).contains(&x) {
                [0; 3]
            } else {
                [200; 3]
            }
        });
        let c = best_in_region(
            img.view(),
            7,
            40.0,
            8.0,
            2,
            3.0,
            Some(Point2::new(24.0, 8.0)),
            ColorSample([180.0; 3]),
            ColorSample([15.0; 3]),
        );
        assert!(c.is_none());
    }
}
