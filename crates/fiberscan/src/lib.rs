//! High-level facade crate for the `fiberscan-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying pipeline crates
//! - the end-to-end scan driver (seed grid → trace → fit → refine)
//! - (feature-gated) helpers that run the detector directly on an
//!   `image::RgbImage`
//!
//! ## Quickstart
//!
//! ```no_run
//! use fiberscan::{detect, ScanParams};
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("fibers.png")?.decode()?.to_rgb8();
//! let result = detect::detect_ellipses_image(&img, &ScanParams::default())?;
//! for d in &result.detections {
//!     println!(
//!         "({:.1}, {:.1}) a={:.1} b={:.1} theta={:.2} score={:.2}",
//!         d.ellipse.cx, d.ellipse.cy, d.ellipse.a, d.ellipse.b, d.ellipse.theta, d.score
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - [`core`](fiberscan_core): pixel views, patches, color statistics.
//! - [`trace`](fiberscan_trace): contrast direction, candidate search,
//!   contour tracing.
//! - [`fit`](fiberscan_fit): conic solving, scoring, best-fit search,
//!   nonlinear refinement.
//! - [`scan`]: the end-to-end driver over a raw pixel view.
//! - [`detect`] (feature `image`): helpers from `image::RgbImage`.
//!
//! The optional `rayon` feature adds [`scan::detect_ellipses_parallel`],
//! dispatching one trace/fit task per seed over a shared read-only buffer.

pub use fiberscan_core as core;
pub use fiberscan_fit as fit;
pub use fiberscan_trace as trace;

pub mod scan;

pub use fiberscan_core::{ColorSample, ImageStats, RgbImage, RgbImageView, ToleranceBands};
pub use fiberscan_fit::{Ellipse, ScoreStrategy};
pub use fiberscan_trace::{ClosureKind, TraceParams, TracedContour};
pub use scan::{detect_ellipses, Detection, ScanError, ScanParams, ScanResult};

#[cfg(feature = "rayon")]
pub use scan::detect_ellipses_parallel;

#[cfg(feature = "image")]
pub mod detect;
