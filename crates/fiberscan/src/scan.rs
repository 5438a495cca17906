//! End-to-end scan driver: seed grid, trace, fit, refine, accumulate.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use fiberscan_core::{compute_stats, ImageStats, PatchView, RgbImageView, ToleranceBands};
use fiberscan_fit::{
    best_fit_search, refine_ellipse, score_boundary, BestFitParams, Ellipse, ScoreStrategy,
};
use fiberscan_trace::{best_in_region, probe, ContourTracer, TraceParams, TracedContour};

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Scan-level parameters. The defaults mirror the reference tuning for
/// fiber micrographs: 7-pixel patches, 20-pixel minimum fiber width and a
/// 40:1 length allowance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanParams {
    /// Patch width for contrast estimation.
    pub box_w: u32,
    /// Minimum fiber width in pixels.
    pub min_width: f64,
    /// Maximum fiber length in pixels.
    pub max_length: f64,
    /// Seed grid step; every `seed_step`-th pixel row/column is probed.
    pub seed_step: usize,
    /// Boundary/ellipse agreement metric.
    #[serde(default)]
    pub strategy: ScoreStrategy,
    /// Acceptance floor for the best-fit search.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Keep per-seed diagnostic contours in the result.
    #[serde(default)]
    pub keep_contours: bool,
}

fn default_min_score() -> f64 {
    0.10
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::with_min_width(20.0)
    }
}

impl ScanParams {
    /// Defaults derived from a minimum fiber width.
    pub fn with_min_width(min_width: f64) -> Self {
        Self {
            box_w: 7,
            min_width,
            max_length: 40.0 * min_width,
            seed_step: 3,
            strategy: ScoreStrategy::default(),
            min_score: default_min_score(),
            keep_contours: false,
        }
    }

    fn trace_params(&self) -> TraceParams {
        TraceParams {
            box_w: self.box_w,
            max_length: self.max_length,
            ..TraceParams::default()
        }
    }

    fn fit_params(&self) -> BestFitParams {
        BestFitParams {
            min_width: self.min_width / 2.0,
            max_length: self.max_length,
            min_score: self.min_score,
            strategy: self.strategy,
            ..BestFitParams::default()
        }
    }
}

/// Malformed inputs rejected before any scanning starts.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("pixel buffer holds {got} bytes, expected 3*{width}*{height}")]
    InvalidBuffer {
        width: usize,
        height: usize,
        got: usize,
    },
    #[error("invalid scan parameters: {0}")]
    InvalidParams(&'static str),
}

/// One detected fiber cross-section.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    pub ellipse: Ellipse,
    /// Fraction of the traced boundary matched by the final ellipse.
    pub score: f64,
}

/// Full scan output.
#[derive(Clone, Debug)]
pub struct ScanResult {
    pub detections: Vec<Detection>,
    /// Traced boundaries, in detection order; empty unless
    /// [`ScanParams::keep_contours`] is set.
    pub contours: Vec<TracedContour>,
    pub stats: ImageStats,
}

fn validate(img: &RgbImageView<'_>, params: &ScanParams) -> Result<(), ScanError> {
    if img.width == 0 || img.height == 0 {
        return Err(ScanError::InvalidDimensions {
            width: img.width,
            height: img.height,
        });
    }
    if img.data.len() != 3 * img.width * img.height {
        return Err(ScanError::InvalidBuffer {
            width: img.width,
            height: img.height,
            got: img.data.len(),
        });
    }
    if params.box_w == 0 {
        return Err(ScanError::InvalidParams("box_w must be positive"));
    }
    if !(params.min_width > 0.0) {
        return Err(ScanError::InvalidParams("min_width must be positive"));
    }
    if !(params.max_length >= params.min_width) {
        return Err(ScanError::InvalidParams(
            "max_length must be at least min_width",
        ));
    }
    if params.seed_step == 0 {
        return Err(ScanError::InvalidParams("seed_step must be positive"));
    }
    Ok(())
}

/// Detect fiber cross-sections in an immutable RGB pixel buffer.
///
/// Seeds are probed on a regular grid; each promising seed is traced to a
/// closed boundary, fitted by the multi-start search and refined by
/// nonlinear least squares. Regions claimed by an accepted boundary are
/// skipped for later seeds.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn detect_ellipses(
    img: &RgbImageView<'_>,
    params: &ScanParams,
) -> Result<ScanResult, ScanError> {
    validate(img, params)?;

    let stats = compute_stats(img);
    let bands = ToleranceBands::from_stats(&stats);
    let tracer = ContourTracer::new(*img, params.trace_params(), stats.mean, bands.low);
    let fit_params = params.fit_params();

    let mut claimed = vec![false; img.width * img.height];
    let mut detections = Vec::new();
    let mut contours = Vec::new();

    for y in (0..img.height).step_by(params.seed_step) {
        for x in (0..img.width).step_by(params.seed_step) {
            if window_claimed(&claimed, img.width, img.height, x, y, params.box_w) {
                continue;
            }
            let Some(seed) = probe_seed(img, params, x, y, &stats, &bands) else {
                continue;
            };
            let Ok(contour) = tracer.trace(seed) else {
                continue;
            };
            if contour.points.len() < 10 {
                continue;
            }

            claim_contour(&mut claimed, img.width, img.height, &contour.points);

            if let Some(det) = fit_contour(&contour.points, params, &fit_params, img) {
                log::debug!(
                    "detected ellipse at ({:.1}, {:.1}) a={:.1} b={:.1} score={:.2}",
                    det.ellipse.cx,
                    det.ellipse.cy,
                    det.ellipse.a,
                    det.ellipse.b,
                    det.score
                );
                detections.push(det);
                if params.keep_contours {
                    contours.push(contour);
                }
            }
        }
    }

    let detections = dedup_detections(detections, params.min_width);
    log::info!(
        "scan complete: {} detections on {}x{}",
        detections.len(),
        img.width,
        img.height
    );

    Ok(ScanResult {
        detections,
        contours,
        stats,
    })
}

/// Parallel variant: one trace/fit task per seed, results deduplicated.
///
/// Each task owns its footprint map; the pixel buffer is shared read-only.
/// The seed list and the result order are deterministic for a fixed
/// scheduling policy.
#[cfg(feature = "rayon")]
pub fn detect_ellipses_parallel(
    img: &RgbImageView<'_>,
    params: &ScanParams,
) -> Result<ScanResult, ScanError> {
    validate(img, params)?;

    let stats = compute_stats(img);
    let bands = ToleranceBands::from_stats(&stats);
    let tracer = ContourTracer::new(*img, params.trace_params(), stats.mean, bands.low);
    let fit_params = params.fit_params();

    let mut seeds = Vec::new();
    for y in (0..img.height).step_by(params.seed_step) {
        for x in (0..img.width).step_by(params.seed_step) {
            if let Some(seed) = probe_seed(img, params, x, y, &stats, &bands) {
                seeds.push(seed);
            }
        }
    }

    let hits: Vec<(TracedContour, Detection)> = seeds
        .par_iter()
        .filter_map(|seed| {
            let contour = tracer.trace(*seed).ok()?;
            if contour.points.len() < 10 {
                return None;
            }
            let det = fit_contour(&contour.points, params, &fit_params, img)?;
            Some((contour, det))
        })
        .collect();

    let mut detections = Vec::with_capacity(hits.len());
    let mut contours = Vec::new();
    for (contour, det) in hits {
        detections.push(det);
        if params.keep_contours {
            contours.push(contour);
        }
    }
    let detections = dedup_detections(detections, params.min_width);

    Ok(ScanResult {
        detections,
        contours,
        stats,
    })
}

/// Cheap prechecks, then the seed-level candidate search. Returns a
/// boundary point worth tracing from, if any.
fn probe_seed(
    img: &RgbImageView<'_>,
    params: &ScanParams,
    x: usize,
    y: usize,
    stats: &ImageStats,
    bands: &ToleranceBands,
) -> Option<Point2<f64>> {
    let patch = PatchView::centered(*img, x as i32, y as i32, params.box_w)?;
    if !patch.has_diagonal_contrast(bands.mid) {
        return None;
    }
    let (_, diff) = probe(&patch);
    if !diff.abs_exceeds(bands.mid) {
        return None;
    }

    // With no previous point the skip-distance gate is inert; the value
    // only matters for the tracer's own searches.
    let skip = params.seed_step as f64;
    let r = (params.seed_step / 2).max(1) as i32;
    let cand = best_in_region(
        *img,
        params.box_w,
        x as f64,
        y as f64,
        r,
        skip,
        None,
        stats.mean,
        bands.low,
    )?;
    cand.contrast.abs_exceeds(bands.high).then_some(cand.point)
}

/// Fit and refine one traced boundary, applying the plausibility filter.
fn fit_contour(
    boundary: &[Point2<f64>],
    params: &ScanParams,
    fit_params: &BestFitParams,
    img: &RgbImageView<'_>,
) -> Option<Detection> {
    let fit = best_fit_search(boundary, fit_params)?;

    let ellipse = match refine_ellipse(boundary, params.min_width / 2.0) {
        Ok(e) => e,
        Err(err) => {
            log::debug!("refinement failed ({err}), dropping candidate");
            return None;
        }
    };

    // Implausible solutions are discarded, not reported.
    let (w, h) = (img.width as f64, img.height as f64);
    if ellipse.a == 0.0
        || ellipse.a > w / 2.0
        || ellipse.cx < 0.0
        || ellipse.cy < 0.0
        || ellipse.cx > w
        || ellipse.cy > h
    {
        return None;
    }

    let score = score_boundary(boundary, &ellipse, params.strategy, fit_params.cutoff_sq);
    // The refined ellipse must explain the boundary at least as plausibly
    // as the raw best fit's acceptance floor.
    if score <= params.min_score {
        log::debug!(
            "refined ellipse scores {:.2}, below floor; keeping best-fit result",
            score
        );
        return Some(Detection {
            ellipse: fit.ellipse,
            score: fit.score,
        });
    }

    Some(Detection { ellipse, score })
}

/// Whether any pixel of the `box_w` window at `(x, y)` is already claimed.
fn window_claimed(
    claimed: &[bool],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    box_w: u32,
) -> bool {
    let half = (box_w / 2) as i32;
    for dy in -half..=half {
        for dx in -half..=half {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0
                && py >= 0
                && (px as usize) < width
                && (py as usize) < height
                && claimed[py as usize * width + px as usize]
            {
                return true;
            }
        }
    }
    false
}

/// Even-odd scanline fill of the closed contour into the claim mask, plus
/// the boundary pixels themselves.
fn claim_contour(claimed: &mut [bool], width: usize, height: usize, pts: &[Point2<f64>]) {
    for p in pts {
        let (x, y) = (p.x as i32, p.y as i32);
        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
            claimed[y as usize * width + x as usize] = true;
        }
    }
    if pts.len() < 3 {
        return;
    }

    let y_min = pts.iter().map(|p| p.y).fold(f64::MAX, f64::min).floor().max(0.0) as usize;
    let y_max = pts
        .iter()
        .map(|p| p.y)
        .fold(f64::MIN, f64::max)
        .ceil()
        .min(height as f64 - 1.0) as usize;

    let mut xs: Vec<f64> = Vec::new();
    for y in y_min..=y_max {
        let yc = y as f64 + 0.5;
        xs.clear();
        for i in 0..pts.len() {
            let p = pts[i];
            let q = pts[(i + 1) % pts.len()];
            if (p.y <= yc && q.y > yc) || (q.y <= yc && p.y > yc) {
                xs.push(p.x + (yc - p.y) / (q.y - p.y) * (q.x - p.x));
            }
        }
        xs.sort_by(|a, b| a.total_cmp(b));
        for pair in xs.chunks_exact(2) {
            let x0 = pair[0].ceil().max(0.0) as usize;
            let x1 = pair[1].floor().min(width as f64 - 1.0) as usize;
            for x in x0..=x1.min(width.saturating_sub(1)) {
                claimed[y * width + x] = true;
            }
        }
    }
}

/// Drop detections whose center duplicates an earlier one. Fiber centers
/// are at least a fiber width apart, so half the minimum width separates
/// true neighbors from re-traces of the same fiber.
fn dedup_detections(detections: Vec<Detection>, min_width: f64) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    let thresh_sq = (min_width / 2.0) * (min_width / 2.0);
    for det in detections {
        let dup = kept.iter().any(|k| {
            let dx = k.ellipse.cx - det.ellipse.cx;
            let dy = k.ellipse.cy - det.ellipse.cy;
            dx * dx + dy * dy < thresh_sq
        });
        if !dup {
            kept.push(det);
        }
    }
    kept
}
