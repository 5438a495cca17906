//! Contrast-guided boundary tracing.
//!
//! Given an immutable RGB pixel buffer and its global color statistics, this
//! crate finds boundary points by angular contrast search and walks closed
//! fiber cross-section outlines from seed points. The output contours feed
//! the ellipse fitting stage in `fiberscan-fit`.

mod direction;
mod footprint;
mod params;
mod search;
mod tracer;

pub use direction::{best_contrast_angle, probe, split_contrast};
pub use footprint::{segment_raster, FootprintMap};
pub use params::TraceParams;
pub use search::{best_in_region, Candidate};
pub use tracer::{ClosureKind, ContourTracer, TraceEvent, TraceFailure, TracedContour};
