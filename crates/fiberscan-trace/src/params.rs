use serde::{Deserialize, Serialize};

/// Parameters for contrast-guided boundary tracing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceParams {
    /// Width of the square patch used for contrast estimation.
    pub box_w: u32,
    /// Search radius (in pixels) around each predicted position.
    pub search_radius: i32,
    /// Step length along the tangent between consecutive boundary points.
    pub skip: f64,
    /// Maximum allowed end-to-end extent of a contour, in pixels.
    pub max_length: f64,
    /// Number of points required before closure/runaway checks engage.
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    /// Divisor applied to the closure cutoff when backtracking out of a
    /// detected loop. Empirical tuning knob.
    #[serde(default = "default_backtrack_divisor")]
    pub backtrack_divisor: f64,
}

fn default_min_points() -> usize {
    15
}

fn default_backtrack_divisor() -> f64 {
    5.0
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            box_w: 7,
            search_radius: 2,
            skip: 1.7 * std::f64::consts::SQRT_2,
            max_length: 800.0,
            min_points: default_min_points(),
            backtrack_divisor: default_backtrack_divisor(),
        }
    }
}

impl TraceParams {
    /// Squared distance under which the trace is considered back at its
    /// starting point.
    pub fn closure_cutoff_sq(&self) -> f64 {
        (3.0 * self.skip) * (3.0 * self.skip)
    }

    /// Hard cap on contour length before the trace is abandoned.
    pub fn max_points(&self) -> usize {
        ((self.max_length / self.skip) * 3.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_serde() {
        let p = TraceParams::default();
        let json = serde_json::to_string(&p).unwrap();
        let q: TraceParams = serde_json::from_str(&json).unwrap();
        assert_eq!(q.box_w, 7);
        assert_eq!(q.min_points, 15);
        assert!((q.skip - 1.7 * std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn derived_limits() {
        let p = TraceParams::default();
        assert!(p.closure_cutoff_sq() > 50.0 && p.closure_cutoff_sq() < 53.0);
        assert_eq!(p.max_points(), ((800.0 / p.skip) * 3.0) as usize);
    }
}
