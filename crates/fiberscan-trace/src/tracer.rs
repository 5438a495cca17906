//! Closed-boundary tracing from a seed point.
//!
//! The tracer advances along the locally estimated tangent, re-centers each
//! step with the candidate search, and maintains a footprint grid to catch
//! self-crossings. A trace ends in one of two usable outcomes (back at the
//! start, or a detected loop that is truncated to its closed part) or in a
//! failure that discards the contour.

use nalgebra::Point2;

use fiberscan_core::{ColorSample, PatchView, RgbImageView};

use crate::direction::best_contrast_angle;
use crate::footprint::FootprintMap;
use crate::params::TraceParams;
use crate::search::best_in_region;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// How a successful trace closed on itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClosureKind {
    /// The trace returned to within the closure cutoff of its first point.
    Closed,
    /// The trace crossed its own footprint and was truncated back to the
    /// closed part.
    LoopDetected,
}

/// A usable traced boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct TracedContour {
    /// Boundary points in trace order, pixel-truncated coordinates.
    pub points: Vec<Point2<f64>>,
    pub closure: ClosureKind,
}

/// Why a trace was abandoned. Failed traces leave no contour.
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceFailure {
    #[error("no valid next boundary point")]
    NoValidPoint,
    #[error("trace ran away from its starting point")]
    TooFar,
    #[error("trace exceeded the point budget")]
    TooManyPoints,
    #[error("sampling patch left the image")]
    OffImage,
}

/// Step-level events for observers; replaces ad hoc debug printing.
#[derive(Clone, Copy, Debug)]
pub enum TraceEvent {
    /// A point was accepted and appended; `len` is the new contour length.
    Advanced { point: Point2<f64>, len: usize },
    /// A loop was detected and the contour truncated to `kept` points.
    Truncated { kept: usize },
}

/// Contrast-guided boundary tracer over one immutable pixel buffer.
pub struct ContourTracer<'a> {
    img: RgbImageView<'a>,
    params: TraceParams,
    mean: ColorSample,
    tol: ColorSample,
}

impl<'a> ContourTracer<'a> {
    /// `mean` is the global average color, `tol` the low-contrast tolerance
    /// band used to gate midpoint jumps.
    pub fn new(img: RgbImageView<'a>, params: TraceParams, mean: ColorSample, tol: ColorSample) -> Self {
        Self {
            img,
            params,
            mean,
            tol,
        }
    }

    /// Trace the boundary through `seed`.
    pub fn trace(&self, seed: Point2<f64>) -> Result<TracedContour, TraceFailure> {
        self.trace_with_observer(seed, &mut |_| {})
    }

    /// Trace with a step observer.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, observer), fields(seed_x = seed.x, seed_y = seed.y))
    )]
    pub fn trace_with_observer(
        &self,
        seed: Point2<f64>,
        observer: &mut dyn FnMut(TraceEvent),
    ) -> Result<TracedContour, TraceFailure> {
        let p = &self.params;
        let skip = p.skip;
        let cutoff_sq = p.closure_cutoff_sq();
        let max_points = p.max_points();

        let mut x = seed.x;
        let mut y = seed.y;
        let mut prev = Point2::new(seed.x.trunc(), seed.y.trunc());
        let mut points = vec![prev];

        let mut footprints = FootprintMap::new(self.img.width, self.img.height);

        let patch = PatchView::centered(self.img, x as i32, y as i32, p.box_w)
            .ok_or(TraceFailure::OffImage)?;
        let mut theta = best_contrast_angle(&patch);

        loop {
            if points.len() > p.min_points {
                let d = sqr_dist(prev, points[0]);
                if d <= cutoff_sq {
                    log::debug!("trace closed after {} points", points.len());
                    return Ok(TracedContour {
                        points,
                        closure: ClosureKind::Closed,
                    });
                }
                if d > p.max_length * p.max_length {
                    log::debug!("trace ran away after {} points", points.len());
                    return Err(TraceFailure::TooFar);
                }
                if points.len() > max_points {
                    log::debug!("trace exceeded {} points", max_points);
                    return Err(TraceFailure::TooManyPoints);
                }
            }

            x += skip * theta.cos();
            y += skip * theta.sin();

            let Some(cand) = best_in_region(
                self.img,
                p.box_w,
                x,
                y,
                p.search_radius,
                skip,
                Some(prev),
                self.mean,
                self.tol,
            ) else {
                log::debug!("no valid next point after {} points", points.len());
                return Err(TraceFailure::NoValidPoint);
            };

            x = cand.point.x;
            y = cand.point.y;
            theta = cand.theta;

            let next = Point2::new(x.trunc(), y.trunc());
            if next == prev {
                continue;
            }

            let a = (prev.x as i32, prev.y as i32);
            let b = (next.x as i32, next.y as i32);

            if footprints.crosses_segment(a, b) {
                // The new segment steps over ground the trace already
                // covered: keep only the closed part. Walk back from the
                // tail until a point lands within the (reduced) closure
                // cutoff of the newest point.
                let last = *points.last().unwrap_or(&prev);
                let backtrack_sq = cutoff_sq / p.backtrack_divisor;
                let mut start = 0;
                for s in (0..points.len().saturating_sub(3)).rev() {
                    if sqr_dist(points[s], last) < backtrack_sq {
                        start = s;
                        break;
                    }
                }
                points.drain(..start);
                observer(TraceEvent::Truncated { kept: points.len() });
                log::debug!("trace looped, truncated to {} points", points.len());
                return Ok(TracedContour {
                    points,
                    closure: ClosureKind::LoopDetected,
                });
            }

            let half = (p.box_w / 2) as f64;
            if x - half < 0.0
                || y - half < 0.0
                || x + half > self.img.width as f64
                || y + half > self.img.height as f64
            {
                log::debug!("trace left the image after {} points", points.len());
                return Err(TraceFailure::OffImage);
            }

            points.push(next);
            footprints.stamp_segment(a, b, points.len() as u32);
            prev = next;
            observer(TraceEvent::Advanced {
                point: next,
                len: points.len(),
            });
        }
    }
}

#[inline]
fn sqr_dist(a: Point2<f64>, b: Point2<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}
