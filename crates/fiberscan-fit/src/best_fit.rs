//! Multi-start five-point fit search over a traced boundary.
//!
//! The search walks span lengths and start offsets over the boundary,
//! fits a conic to five evenly spaced points of each window, then tries a
//! small grid of center nudges combined with a rescale through each sample
//! point. The best-scoring configuration wins; the winner is recomputed
//! once at the end so intermediate candidates never need to be stored.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::conic::{conic_to_ellipse, solve_five_point};
use crate::ellipse::Ellipse;
use crate::score::{score_boundary, ScoreStrategy, DEFAULT_CUTOFF_SQ};

/// Tuning for the best-fit search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BestFitParams {
    /// Reject candidates whose minor axis falls below this width.
    pub min_width: f64,
    /// Reject candidates whose major axis exceeds this length.
    pub max_length: f64,
    /// Acceptance floor on the winning score. Empirical tuning knob.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default)]
    pub strategy: ScoreStrategy,
    /// Squared-distance cutoff for nearest-outline scoring.
    #[serde(default = "default_cutoff_sq")]
    pub cutoff_sq: f64,
}

fn default_min_score() -> f64 {
    0.10
}

fn default_cutoff_sq() -> f64 {
    DEFAULT_CUTOFF_SQ
}

impl Default for BestFitParams {
    fn default() -> Self {
        Self {
            min_width: 10.0,
            max_length: 800.0,
            min_score: default_min_score(),
            strategy: ScoreStrategy::default(),
            cutoff_sq: default_cutoff_sq(),
        }
    }
}

/// One evaluated search configuration. The winning candidate identifies the
/// configuration to recompute, not the ellipse itself.
#[derive(Clone, Copy, Debug)]
pub struct FitCandidate {
    /// Start index of the span on the boundary.
    pub start: usize,
    /// Span length in boundary points.
    pub span: usize,
    /// Which of the five sample points fixed the rescale.
    pub point_idx: usize,
    /// Integer center offset applied before rescaling.
    pub nudge: (i32, i32),
    pub score: f64,
}

/// A successful best-fit result.
#[derive(Clone, Debug)]
pub struct BestFit {
    pub ellipse: Ellipse,
    /// Fraction of boundary points matched, in (params.min_score, 1].
    pub score: f64,
    /// The five points the winning conic was fitted through.
    pub support: [Point2<f64>; 5],
}

/// Five points evenly spread across `span` boundary indices starting at
/// `start`, wrapping modulo the boundary length.
fn spaced_points(boundary: &[Point2<f64>], start: usize, span: usize) -> [Point2<f64>; 5] {
    let n = boundary.len();
    let mut out = [Point2::origin(); 5];
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = boundary[(start + span * k / 5) % n];
    }
    out
}

/// The 3×3 nudge grid in flattened order.
fn nudge_offset(nudge: usize) -> (i32, i32) {
    (nudge as i32 % 3 - 1, nudge as i32 / 3 - 1)
}

/// Nudge the fitted center, then rescale so `p` lies exactly on the ellipse.
/// Returns `None` when the rescaled axes leave the allowed size window.
fn nudged_rescale(
    raw: &Ellipse,
    p: Point2<f64>,
    nudge: (i32, i32),
    params: &BestFitParams,
) -> Option<Ellipse> {
    let shifted = Ellipse {
        cx: raw.cx + nudge.0 as f64,
        cy: raw.cy + nudge.1 as f64,
        ..*raw
    };
    let scale = shifted.unit_eval(p.x, p.y).sqrt();
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let scaled = shifted.scaled(scale);
    if scaled.a > params.max_length || scaled.b < params.min_width {
        return None;
    }
    Some(scaled)
}

/// Find the best-agreeing ellipse over spans of 30–70% of the boundary.
///
/// Returns `None` when the boundary is too short or no configuration scores
/// above the acceptance floor.
pub fn best_fit_search(boundary: &[Point2<f64>], params: &BestFitParams) -> Option<BestFit> {
    let n = boundary.len();
    if n < 10 {
        return None;
    }

    let mut best: Option<FitCandidate> = None;

    for tenths in 3..=7usize {
        let span = tenths * n / 10;
        for start in (0..n).step_by(2) {
            let five = spaced_points(boundary, start, span);
            let Ok(conic) = solve_five_point(&five) else {
                continue;
            };
            let Ok(raw) = conic_to_ellipse(&conic) else {
                continue;
            };

            // Best (point, nudge) pair for this window.
            let local = (0..5)
                .flat_map(|point_idx| (0..9).map(move |nudge| (point_idx, nudge)))
                .filter_map(|(point_idx, nudge)| {
                    let offset = nudge_offset(nudge);
                    let candidate =
                        nudged_rescale(&raw, five[point_idx], offset, params)?;
                    let score =
                        score_boundary(boundary, &candidate, params.strategy, params.cutoff_sq);
                    Some(FitCandidate {
                        start,
                        span,
                        point_idx,
                        nudge: offset,
                        score,
                    })
                })
                .fold(None::<FitCandidate>, |acc, c| match acc {
                    Some(b) if b.score >= c.score => Some(b),
                    _ => Some(c),
                });

            if let Some(c) = local {
                let replace = best.map(|b| c.score > b.score).unwrap_or(true);
                if replace {
                    best = Some(c);
                }
            }
        }
    }

    let winner = best.filter(|c| c.score > params.min_score)?;

    // Recompute the winning configuration once.
    let five = spaced_points(boundary, winner.start, winner.span);
    let conic = solve_five_point(&five).ok()?;
    let raw = conic_to_ellipse(&conic).ok()?;
    let ellipse = nudged_rescale(&raw, five[winner.point_idx], winner.nudge, params)?;

    log::debug!(
        "best fit: span {}/{} start {} nudge {:?} score {:.3}",
        winner.span,
        boundary.len(),
        winner.start,
        winner.nudge,
        winner.score
    );

    Some(BestFit {
        ellipse,
        score: winner.score,
        support: five,
    })
}
