//! Algebraic conic fitting and canonicalization.
//!
//! Five boundary points determine a conic `Ax² + Bxy + Cy² + Dx + Ey = 1`
//! (the constant normalized away). Canonicalization recovers semi-axes,
//! center and rotation, rejecting anything that is not an ellipse. Both
//! failure modes are local: callers skip the candidate and move on.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix2, Matrix3, Matrix5, Point2, Vector5};
use serde::{Deserialize, Serialize};

use crate::ellipse::Ellipse;

/// General conic coefficients `[A, B, C, D, E, F]` for
/// `Ax² + Bxy + Cy² + Dx + Ey + F = 0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Per-candidate fitting failures. Never fatal: the enclosing search skips
/// the candidate.
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum FitError {
    #[error("five-point conic system is singular")]
    SingularSystem,
    #[error("conic does not describe an ellipse")]
    NotAnEllipse,
}

/// Solve the conic through five points, normalizing the constant term:
/// each point contributes a row `[x², xy, y², x, y] · [A..E]ᵀ = 1`, so the
/// returned coefficients carry `F = 1` on the moved-over side.
///
/// Degenerate subsets (collinear, coincident, otherwise rank-deficient)
/// fail with [`FitError::SingularSystem`].
pub fn solve_five_point(points: &[Point2<f64>; 5]) -> Result<ConicCoeffs, FitError> {
    let mut m = Matrix5::<f64>::zeros();
    for (r, p) in points.iter().enumerate() {
        m[(r, 0)] = p.x * p.x;
        m[(r, 1)] = p.x * p.y;
        m[(r, 2)] = p.y * p.y;
        m[(r, 3)] = p.x;
        m[(r, 4)] = p.y;
    }
    let rhs = Vector5::repeat(1.0);
    let sol = m.lu().solve(&rhs).ok_or(FitError::SingularSystem)?;
    if sol.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularSystem);
    }
    Ok(ConicCoeffs([sol[0], sol[1], sol[2], sol[3], sol[4], 1.0]))
}

/// Extract canonical ellipse parameters from general conic coefficients.
///
/// Rejects parabolas/hyperbolas by discriminant, then derives the semi-axes
/// from the eigenvalues of the quadratic part and the determinants of the
/// full and reduced conic matrices. The eigenvalue closer to `A` is
/// associated with the x-dominant axis. A non-real semi-axis (degenerate
/// conic) is reported as [`FitError::NotAnEllipse`].
///
/// Note: the five-point solver's normalization fixes the conic's overall
/// scale, not the ellipse's — the caller is expected to rescale through a
/// known boundary point (see the best-fit search).
pub fn conic_to_ellipse(conic: &ConicCoeffs) -> Result<Ellipse, FitError> {
    let [a, b, c, d, e, f] = conic.0;

    if b * b - 4.0 * a * c >= 0.0 {
        return Err(FitError::NotAnEllipse);
    }

    // 4AC > B² implies A and C share a sign; normalize to a positive
    // quadratic part so the axis disambiguation below can read the form
    // directly. Every formula used here is invariant under this negation.
    let (a, b, c, d, e, f) = if a < 0.0 {
        (-a, -b, -c, -d, -e, -f)
    } else {
        (a, b, c, d, e, f)
    };

    let m3 = Matrix3::new(f, d / 2.0, e / 2.0, d / 2.0, a, b / 2.0, e / 2.0, b / 2.0, c);
    let m2 = Matrix2::new(a, b / 2.0, b / 2.0, c);
    let det3 = m3.determinant();
    let det2 = m2.determinant();

    let eigs = m2.symmetric_eigenvalues();
    // Associate l1 with the eigenvalue lying nearer A than C.
    let (l1, l2) = if (eigs[0] - a).abs() <= (eigs[0] - c).abs() {
        (eigs[0], eigs[1])
    } else {
        (eigs[1], eigs[0])
    };

    let axis_sq_1 = -det3 / (det2 * l1);
    let axis_sq_2 = -det3 / (det2 * l2);
    if !(axis_sq_1 > 0.0) || !(axis_sq_2 > 0.0) || !axis_sq_1.is_finite() || !axis_sq_2.is_finite()
    {
        return Err(FitError::NotAnEllipse);
    }
    let axis1 = axis_sq_1.sqrt();
    let axis2 = axis_sq_2.sqrt();

    let denom = 4.0 * a * c - b * b;
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let theta = (FRAC_PI_2 - ((a - c) / (b + 1e-9)).atan()) / 2.0;

    // The bisection above leaves a ±π/2 ambiguity between the two principal
    // axes. The quadratic form is smallest along the major axis, so pick the
    // candidate angle that minimizes it.
    let (major, minor) = if axis1 >= axis2 {
        (axis1, axis2)
    } else {
        (axis2, axis1)
    };
    let q = |phi: f64| {
        let (s, co) = phi.sin_cos();
        a * co * co + b * co * s + c * s * s
    };
    let theta = if q(theta) <= q(theta + FRAC_PI_2) {
        theta
    } else {
        theta + FRAC_PI_2
    };
    let theta = theta.rem_euclid(PI);

    let ellipse = Ellipse {
        cx,
        cy,
        a: major,
        b: minor,
        theta,
    };
    if !ellipse.is_valid() {
        return Err(FitError::NotAnEllipse);
    }
    Ok(ellipse)
}
