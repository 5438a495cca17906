//! Nonlinear least-squares refinement of an ellipse against the full
//! boundary.
//!
//! Minimizes the algebraic residual of the generalized ellipse equation
//! over (a, b, h, k, θ) with a damped Gauss–Newton (Levenberg–Marquardt)
//! iteration on the analytic Jacobian.

use nalgebra::{Matrix5, Point2, Vector5};

use crate::ellipse::Ellipse;

/// Refinement failures. The caller treats a failed refinement as "keep the
/// unrefined candidate" or "no detection", never as a fatal error.
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum RefineError {
    #[error("boundary bounding box is degenerate")]
    DegenerateInput,
    #[error("numerical failure in least-squares iteration")]
    Numerical,
}

/// Longest distance between boundary points half the sequence apart; a
/// cheap proxy for the major axis.
fn longest_half_offset_dist(boundary: &[Point2<f64>]) -> f64 {
    let n = boundary.len();
    let mut max_sq = 0.0f64;
    for i in 0..n / 2 {
        let p = boundary[i];
        let q = boundary[(i + n / 2) % n];
        let dx = p.x - q.x;
        let dy = p.y - q.y;
        max_sq = max_sq.max(dx * dx + dy * dy);
    }
    max_sq.sqrt()
}

/// Initial guess for the optimizer: the longest half-offset distance gives
/// the major axis, the caller's width hint the minor axis, the bounding box
/// the center and slope.
fn initial_guess(boundary: &[Point2<f64>], min_width: f64) -> Result<Ellipse, RefineError> {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;
    for p in boundary {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_min = y_min.min(p.y);
        y_max = y_max.max(p.y);
    }
    if x_max - x_min <= 0.0 {
        return Err(RefineError::DegenerateInput);
    }
    Ok(Ellipse {
        cx: (x_min + x_max) / 2.0,
        cy: (y_min + y_max) / 2.0,
        a: longest_half_offset_dist(boundary) / 2.0,
        b: min_width,
        theta: ((y_max - y_min) / (x_max - x_min)).tan(),
    })
}

/// Sum of squared residuals, or `None` on non-finite evaluation.
fn cost(p: &Vector5<f64>, boundary: &[Point2<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    for pt in boundary {
        let r = residual(p, pt)?;
        sum += r * r;
    }
    sum.is_finite().then_some(sum)
}

#[inline]
fn residual(p: &Vector5<f64>, pt: &Point2<f64>) -> Option<f64> {
    let (a, b, h, k, t) = (p[0], p[1], p[2], p[3], p[4]);
    if a.abs() < 1e-9 || b.abs() < 1e-9 {
        return None;
    }
    let (s, c) = t.sin_cos();
    let u = (pt.x - h) * c + (pt.y - k) * s;
    let v = (pt.x - h) * s - (pt.y - k) * c;
    let r = u * u / (a * a) + v * v / (b * b) - 1.0;
    r.is_finite().then_some(r)
}

/// Refine the boundary to an ellipse with Levenberg–Marquardt.
///
/// `min_width` seeds the minor axis. Fails on a degenerate bounding box or
/// any non-finite linear algebra along the way.
pub fn refine_ellipse(
    boundary: &[Point2<f64>],
    min_width: f64,
) -> Result<Ellipse, RefineError> {
    if boundary.len() < 6 {
        return Err(RefineError::DegenerateInput);
    }
    let guess = initial_guess(boundary, min_width)?;
    let mut p = Vector5::new(guess.a, guess.b, guess.cx, guess.cy, guess.theta);
    let mut current_cost = cost(&p, boundary).ok_or(RefineError::Numerical)?;
    let mut lambda = 1e-3;

    for _ in 0..100 {
        // Normal equations from the analytic Jacobian.
        let mut jtj = Matrix5::<f64>::zeros();
        let mut jtr = Vector5::<f64>::zeros();
        let (a, b, h, k, t) = (p[0], p[1], p[2], p[3], p[4]);
        let (s, c) = t.sin_cos();
        let a2 = a * a;
        let b2 = b * b;

        for pt in boundary {
            let u = (pt.x - h) * c + (pt.y - k) * s;
            let v = (pt.x - h) * s - (pt.y - k) * c;
            let r = u * u / a2 + v * v / b2 - 1.0;
            let grad = Vector5::new(
                -2.0 * u * u / (a2 * a),
                -2.0 * v * v / (b2 * b),
                -2.0 * u * c / a2 - 2.0 * v * s / b2,
                -2.0 * u * s / a2 + 2.0 * v * c / b2,
                2.0 * u * v * (1.0 / b2 - 1.0 / a2),
            );
            jtj += grad * grad.transpose();
            jtr += grad * r;
        }

        if !jtj.iter().all(|v| v.is_finite()) || !jtr.iter().all(|v| v.is_finite()) {
            return Err(RefineError::Numerical);
        }

        // Damped step; on a cost increase, raise damping and retry.
        let mut stepped = false;
        for _ in 0..10 {
            let mut damped = jtj;
            for i in 0..5 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(delta) = damped.lu().solve(&(-jtr)) else {
                return Err(RefineError::Numerical);
            };
            if delta.iter().any(|v| !v.is_finite()) {
                return Err(RefineError::Numerical);
            }
            let trial = p + delta;
            match cost(&trial, boundary) {
                Some(trial_cost) if trial_cost < current_cost => {
                    p = trial;
                    current_cost = trial_cost;
                    lambda = (lambda / 3.0).max(1e-12);
                    stepped = delta.norm() > 1e-12;
                    break;
                }
                _ => lambda *= 10.0,
            }
            if lambda > 1e12 {
                break;
            }
        }
        if !stepped {
            break;
        }
    }

    let (mut a, mut b, h, k, mut t) = (p[0].abs(), p[1].abs(), p[2], p[3], p[4]);
    if b > a {
        std::mem::swap(&mut a, &mut b);
        t += std::f64::consts::FRAC_PI_2;
    }
    let out = Ellipse {
        cx: h,
        cy: k,
        a,
        b,
        theta: t,
    };
    if !out.is_valid() {
        return Err(RefineError::Numerical);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use std::f64::consts::PI;

    fn boundary_of(e: &Ellipse, n: usize) -> Vec<Point2<f64>> {
        (0..n)
            .map(|k| e.point_at(k as f64 * std::f64::consts::TAU / n as f64))
            .collect()
    }

    fn assert_recovers(got: &Ellipse, want: &Ellipse, tol_axis: f64, tol_center: f64) {
        assert!((got.a - want.a).abs() < tol_axis, "a: {} vs {}", got.a, want.a);
        assert!((got.b - want.b).abs() < tol_axis, "b: {} vs {}", got.b, want.b);
        assert!((got.cx - want.cx).abs() < tol_center);
        assert!((got.cy - want.cy).abs() < tol_center);
        let dt = (got.theta - want.theta).rem_euclid(PI);
        assert!(dt < 0.05 || dt > PI - 0.05, "theta: {} vs {}", got.theta, want.theta);
    }

    #[test]
    fn refines_exact_boundary() {
        let want = Ellipse {
            cx: 140.0,
            cy: 100.0,
            a: 36.0,
            b: 17.0,
            theta: 0.8,
        };
        let boundary = boundary_of(&want, 120);
        let got = refine_ellipse(&boundary, 10.0).expect("refinement should converge");
        assert_recovers(&got, &want, 0.5, 0.5);
    }

    #[test]
    fn refines_noisy_truncated_boundary() {
        let want = Ellipse {
            cx: 90.0,
            cy: 130.0,
            a: 30.0,
            b: 20.0,
            theta: 2.3,
        };
        let mut rng = StdRng::seed_from_u64(11);
        let boundary: Vec<Point2<f64>> = boundary_of(&want, 100)
            .into_iter()
            .map(|p| {
                Point2::new(
                    (p.x + rng.gen_range(-0.8..0.8)).trunc(),
                    (p.y + rng.gen_range(-0.8..0.8)).trunc(),
                )
            })
            .collect();
        let got = refine_ellipse(&boundary, 12.0).expect("refinement should converge");
        assert_recovers(&got, &want, 1.5, 1.5);
    }

    #[test]
    fn vertical_line_is_degenerate() {
        let boundary: Vec<Point2<f64>> =
            (0..20).map(|i| Point2::new(42.0, i as f64)).collect();
        assert_eq!(
            refine_ellipse(&boundary, 10.0),
            Err(RefineError::DegenerateInput)
        );
    }

    #[test]
    fn tiny_input_is_degenerate() {
        let boundary = vec![Point2::new(0.0, 0.0); 3];
        assert_eq!(
            refine_ellipse(&boundary, 10.0),
            Err(RefineError::DegenerateInput)
        );
    }
}
