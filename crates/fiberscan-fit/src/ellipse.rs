use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::conic::ConicCoeffs;

/// Geometric ellipse parameters in image pixel coordinates.
///
/// `a >= b` is maintained by every constructor in this crate; `theta` is the
/// rotation of the major axis from +x, in radians.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub cx: f64,
    pub cy: f64,
    pub a: f64,
    pub b: f64,
    pub theta: f64,
}

impl Ellipse {
    /// Finite parameters with strictly positive semi-axes.
    pub fn is_valid(&self) -> bool {
        self.a > 0.0
            && self.b > 0.0
            && self.a.is_finite()
            && self.b.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.theta.is_finite()
    }

    /// Point on the boundary at parametric angle `t`.
    pub fn point_at(&self, t: f64) -> Point2<f64> {
        let (st, ct) = t.sin_cos();
        let (sa, ca) = self.theta.sin_cos();
        Point2::new(
            self.cx + self.a * ct * ca - self.b * st * sa,
            self.cy + self.a * ct * sa + self.b * st * ca,
        )
    }

    /// Left-hand side of the generalized ellipse equation at `(x, y)`:
    /// 1 on the boundary, < 1 inside, > 1 outside.
    pub fn unit_eval(&self, x: f64, y: f64) -> f64 {
        let (s, c) = self.theta.sin_cos();
        let dx = x - self.cx;
        let dy = y - self.cy;
        let u = dx * c + dy * s;
        let v = dx * s - dy * c;
        u * u / (self.a * self.a) + v * v / (self.b * self.b)
    }

    /// Uniformly rescale both semi-axes by `s`.
    pub fn scaled(&self, s: f64) -> Self {
        Self {
            a: self.a * s,
            b: self.b * s,
            ..*self
        }
    }

    /// Discretized outline at fixed angular resolution (720 samples),
    /// truncated to integer pixel positions with consecutive duplicates
    /// collapsed.
    pub fn outline(&self) -> Vec<Point2<f64>> {
        const SAMPLES: usize = 720;
        let mut out = Vec::with_capacity(SAMPLES);
        let first = self.point_at(0.0);
        out.push(Point2::new(first.x.trunc(), first.y.trunc()));
        for t in 1..SAMPLES {
            let p = self.point_at(t as f64 * std::f64::consts::TAU / SAMPLES as f64);
            let p = Point2::new(p.x.trunc(), p.y.trunc());
            if Some(&p) != out.last() {
                out.push(p);
            }
        }
        out
    }

    /// Focal points of the ellipse (`a >= b` assumed).
    pub fn foci(&self) -> (Point2<f64>, Point2<f64>) {
        let c = (self.a * self.a - self.b * self.b).max(0.0).sqrt();
        let (s, co) = self.theta.sin_cos();
        (
            Point2::new(self.cx - co * c, self.cy - s * c),
            Point2::new(self.cx + co * c, self.cy + s * c),
        )
    }

    /// General conic coefficients of this ellipse, with the constant term
    /// chosen so that the quadratic part has positive leading coefficients.
    pub fn to_conic(&self) -> ConicCoeffs {
        let (s, c) = self.theta.sin_cos();
        let a2 = self.a * self.a;
        let b2 = self.b * self.b;
        let ca = b2 * c * c + a2 * s * s;
        let cb = -2.0 * c * s * (a2 - b2);
        let cc = b2 * s * s + a2 * c * c;
        let cd = -2.0 * ca * self.cx - self.cy * cb;
        let ce = -2.0 * cc * self.cy - self.cx * cb;
        let cf = -a2 * b2
            + ca * self.cx * self.cx
            + cb * self.cx * self.cy
            + cc * self.cy * self.cy;
        ConicCoeffs([ca, cb, cc, cd, ce, cf])
    }
}
