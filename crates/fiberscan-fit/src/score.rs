//! Agreement scoring between a traced boundary and a candidate ellipse.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::ellipse::Ellipse;

/// Squared-distance cutoff for [`ScoreStrategy::NearestOutline`], in pixels².
pub const DEFAULT_CUTOFF_SQ: f64 = 9.0;

/// Relative tolerance for the focal-sum and algebraic-residual strategies.
const RESIDUAL_TOL: f64 = 0.01;

/// How boundary/ellipse agreement is measured. All strategies return the
/// fraction of boundary points considered "on" the candidate ellipse.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStrategy {
    /// Nearest-point distance against a discretized ellipse outline.
    #[default]
    NearestOutline,
    /// Sum of distances to the two foci compared to the string length `2a`.
    FocalDistance,
    /// Residual of the generalized ellipse equation.
    AlgebraicResidual,
}

/// Fraction of `boundary` points matched by `ellipse` under `strategy`.
///
/// `cutoff_sq` only applies to the nearest-outline strategy.
pub fn score_boundary(
    boundary: &[Point2<f64>],
    ellipse: &Ellipse,
    strategy: ScoreStrategy,
    cutoff_sq: f64,
) -> f64 {
    if boundary.is_empty() {
        return 0.0;
    }
    match strategy {
        ScoreStrategy::NearestOutline => nearest_outline(boundary, ellipse, cutoff_sq),
        ScoreStrategy::FocalDistance => focal_distance(boundary, ellipse),
        ScoreStrategy::AlgebraicResidual => algebraic_residual(boundary, ellipse),
    }
}

/// Scan the ellipse outline once per boundary point, resuming from the
/// index of the previous match. Boundary and outline run in roughly the
/// same angular order, so the resumed scan usually succeeds after a few
/// steps instead of a full revolution.
fn nearest_outline(boundary: &[Point2<f64>], ellipse: &Ellipse, cutoff_sq: f64) -> f64 {
    let outline = ellipse.outline();
    if outline.is_empty() {
        return 0.0;
    }

    let mut good = 0usize;
    let mut resume = 0usize;
    for p in boundary {
        for k in 0..outline.len() {
            let idx = (resume + k) % outline.len();
            let q = outline[idx];
            let dx = p.x - q.x;
            let dy = p.y - q.y;
            if dx * dx + dy * dy < cutoff_sq {
                good += 1;
                resume = idx;
                break;
            }
        }
    }
    good as f64 / boundary.len() as f64
}

fn focal_distance(boundary: &[Point2<f64>], ellipse: &Ellipse) -> f64 {
    let (f1, f2) = ellipse.foci();
    let s = 2.0 * ellipse.a;
    if s <= 0.0 {
        return 0.0;
    }
    let good = boundary
        .iter()
        .filter(|p| {
            let d = (*p - f1).norm() + (*p - f2).norm();
            (d / s - 1.0).abs() < RESIDUAL_TOL
        })
        .count();
    good as f64 / boundary.len() as f64
}

fn algebraic_residual(boundary: &[Point2<f64>], ellipse: &Ellipse) -> f64 {
    let good = boundary
        .iter()
        .filter(|p| (ellipse.unit_eval(p.x, p.y) - 1.0).abs() < RESIDUAL_TOL)
        .count();
    good as f64 / boundary.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_ellipse() -> Ellipse {
        Ellipse {
            cx: 70.0,
            cy: 90.0,
            a: 26.0,
            b: 14.0,
            theta: 0.5,
        }
    }

    fn boundary_of(e: &Ellipse, n: usize) -> Vec<Point2<f64>> {
        (0..n)
            .map(|k| e.point_at(k as f64 * std::f64::consts::TAU / n as f64))
            .collect()
    }

    #[test]
    fn perfect_boundary_scores_one() {
        let e = test_ellipse();
        let boundary = boundary_of(&e, 90);
        for strategy in [
            ScoreStrategy::NearestOutline,
            ScoreStrategy::FocalDistance,
            ScoreStrategy::AlgebraicResidual,
        ] {
            let s = score_boundary(&boundary, &e, strategy, DEFAULT_CUTOFF_SQ);
            assert_relative_eq!(s, 1.0);
        }
    }

    #[test]
    fn unrelated_boundary_scores_near_zero() {
        let e = test_ellipse();
        let far = Ellipse {
            cx: 300.0,
            cy: 300.0,
            ..e
        };
        let boundary = boundary_of(&far, 60);
        let s = score_boundary(&boundary, &e, ScoreStrategy::NearestOutline, DEFAULT_CUTOFF_SQ);
        assert_relative_eq!(s, 0.0);
    }

    #[test]
    fn translation_of_both_sets_preserves_the_score() {
        let e = test_ellipse();
        let mut boundary = boundary_of(&e, 60);
        // Push half the points off the ellipse for a mid-range score.
        for p in boundary.iter_mut().step_by(2) {
            p.x += 9.0;
        }
        let s0 = score_boundary(&boundary, &e, ScoreStrategy::NearestOutline, DEFAULT_CUTOFF_SQ);

        let shifted: Vec<_> = boundary
            .iter()
            .map(|p| Point2::new(p.x + 37.0, p.y - 12.0))
            .collect();
        let e2 = Ellipse {
            cx: e.cx + 37.0,
            cy: e.cy - 12.0,
            ..e
        };
        let s1 = score_boundary(&shifted, &e2, ScoreStrategy::NearestOutline, DEFAULT_CUTOFF_SQ);
        assert_relative_eq!(s0, s1);
    }

    #[test]
    fn reversing_boundary_order_preserves_the_score() {
        let e = test_ellipse();
        let mut boundary = boundary_of(&e, 61);
        for p in boundary.iter_mut().step_by(3) {
            p.y += 11.0;
        }
        let s0 = score_boundary(&boundary, &e, ScoreStrategy::NearestOutline, DEFAULT_CUTOFF_SQ);
        let reversed: Vec<_> = boundary.iter().rev().copied().collect();
        let s1 = score_boundary(&reversed, &e, ScoreStrategy::NearestOutline, DEFAULT_CUTOFF_SQ);
        assert_relative_eq!(s0, s1);
    }
}
