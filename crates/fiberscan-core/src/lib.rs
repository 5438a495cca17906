//! Core pixel, patch and statistics types for fiber cross-section detection.
//!
//! This crate is intentionally small. It owns the color/pixel view types the
//! tracer and fitter crates share, plus the global image statistics the
//! detector derives its contrast tolerances from. It does *not* depend on
//! any concrete image codec.

mod color;
mod image;
mod logger;
mod patch;
mod stats;

pub use color::ColorSample;
pub use image::{RgbImage, RgbImageView};
pub use patch::PatchView;
pub use stats::{compute_stats, ImageStats, ToleranceBands};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;
pub use logger::init_with_level;
