//! Least-squares fits using nalgebra
//!
//! Provides the straight-line fit used for magnitude/wavelength relations and
//! the quadratic surface used to model smooth backgrounds under a source.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Errors that can occur while fitting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Need at least {needed} samples, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("Design matrix is rank deficient (rank {rank} of {needed})")]
    RankDeficient { rank: usize, needed: usize },
    #[error("SVD solve failed: {0}")]
    SolveFailed(String),
}

/// Threshold below which singular values are treated as zero
const SINGULAR_EPSILON: f64 = 1e-10;

/// Straight line `y = slope * x + intercept` from ordinary least squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Fit a line through `(xs[i], ys[i])`.
    ///
    /// # Errors
    /// * `MismatchedLengths` - `xs` and `ys` differ in length
    /// * `InsufficientData` - fewer than two samples
    /// * `RankDeficient` - all `xs` identical
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::MismatchedLengths);
        }
        if xs.len() < 2 {
            return Err(FitError::InsufficientData {
                needed: 2,
                got: xs.len(),
            });
        }

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (&x, &y) in xs.iter().zip(ys) {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }

        if sxx < SINGULAR_EPSILON {
            return Err(FitError::RankDeficient { rank: 1, needed: 2 });
        }

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Second-order 2D polynomial
/// `axx·dx² + ayy·dy² + axy·dx·dy + bx·dx + by·dy + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticSurface {
    /// Coefficients in the order `[axx, ayy, axy, bx, by, c]`
    pub coefficients: [f64; 6],
}

impl QuadraticSurface {
    const TERMS: usize = 6;

    fn basis(dx: f64, dy: f64) -> [f64; 6] {
        [dx * dx, dy * dy, dx * dy, dx, dy, 1.0]
    }

    /// Fit the surface to `(dx, dy, value)` samples using an SVD solve.
    ///
    /// # Errors
    /// * `InsufficientData` - fewer than six samples
    /// * `RankDeficient` - samples do not constrain all six terms
    ///   (e.g. collinear positions)
    pub fn fit(samples: &[(f64, f64, f64)]) -> Result<Self, FitError> {
        if samples.len() < Self::TERMS {
            return Err(FitError::InsufficientData {
                needed: Self::TERMS,
                got: samples.len(),
            });
        }

        let design = DMatrix::from_fn(samples.len(), Self::TERMS, |row, col| {
            let (dx, dy, _) = samples[row];
            Self::basis(dx, dy)[col]
        });
        let values = DVector::from_iterator(samples.len(), samples.iter().map(|s| s.2));

        let svd = design.svd(true, true);
        let rank = svd.rank(SINGULAR_EPSILON);
        if rank < Self::TERMS {
            return Err(FitError::RankDeficient {
                rank,
                needed: Self::TERMS,
            });
        }

        let solution = svd
            .solve(&values, SINGULAR_EPSILON)
            .map_err(|e| FitError::SolveFailed(e.to_string()))?;

        let mut coefficients = [0.0; 6];
        coefficients.copy_from_slice(solution.as_slice());
        Ok(Self { coefficients })
    }

    pub fn eval(&self, dx: f64, dy: f64) -> f64 {
        Self::basis(dx, dy)
            .iter()
            .zip(&self.coefficients)
            .map(|(b, c)| b * c)
            .sum()
    }
}
