//! Background level estimation for aperture photometry.
//!
//! Two estimators are in use and they are deliberately kept apart:
//!
//! - [`BackgroundStrategy::SigmaClippedMedian`] for point-source photometry
//!   on the four raw-intensity channels
//! - [`BackgroundStrategy::Median`] for disk photometry on Q_phi images and
//!   for the single-shot disk and object readouts
//!
//! Switching a call site from one to the other changes its numbers. Both
//! ignore non-finite samples and return NaN when nothing usable is left.

use phot_math::{median, sigma_clipped_median};
use serde::{Deserialize, Serialize};

/// Clipping threshold used by the point-source call path.
pub const DEFAULT_CLIP_SIGMA: f64 = 4.0;

/// How the background annulus is collapsed to one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BackgroundStrategy {
    /// Iterative mean ± `sigma`·σ rejection, then the median of survivors
    SigmaClippedMedian { sigma: f64 },
    /// Plain median of the annulus
    Median,
}

impl Default for BackgroundStrategy {
    fn default() -> Self {
        BackgroundStrategy::SigmaClippedMedian {
            sigma: DEFAULT_CLIP_SIGMA,
        }
    }
}

impl BackgroundStrategy {
    /// Estimate the background level from the annulus pixel values.
    ///
    /// Returns NaN for an empty or entirely non-finite annulus.
    pub fn estimate(&self, values: &[f64]) -> f64 {
        match *self {
            BackgroundStrategy::SigmaClippedMedian { sigma } => sigma_clipped_median(values, sigma),
            BackgroundStrategy::Median => {
                let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
                median(&finite).unwrap_or(f64::NAN)
            }
        }
    }
}
