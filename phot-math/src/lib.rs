//! phot-math - Numeric primitives for photometric reduction
//!
//! This crate holds the image-agnostic math used by the disk photometry
//! engine:
//!
//! - **Statistics** - NaN-filtering median, iterative sigma clipping and a
//!   streaming NaN-aware mean/standard-deviation accumulator
//! - **Fits** - Least-squares straight lines and quadratic 2D surfaces
//!
//! # Example
//!
//! ```
//! use phot_math::{sigma_clipped_median, NanStats};
//!
//! let background = [2.0, 2.1, 1.9, 2.0, 250.0];
//! let level = sigma_clipped_median(&background, 1.5);
//! assert!((level - 2.0).abs() < 0.1);
//!
//! let stats: NanStats = [1.0, f64::NAN, 3.0].into_iter().collect();
//! assert_eq!(stats.mean(), 2.0);
//! ```

pub mod fit;
pub mod stats;

pub use fit::{FitError, LinearFit, QuadraticSurface};
pub use stats::{median, nan_mean, nan_std, sigma_clip, sigma_clipped_median, NanStats};
