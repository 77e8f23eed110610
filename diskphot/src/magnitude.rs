//! Magnitudes derived from measured counts.

use phot_math::{FitError, LinearFit};
use serde::{Deserialize, Serialize};

/// Color magnitude `2.5·log10(a / b)` of two band fluxes.
///
/// Returns NaN unless the ratio is positive and finite.
pub fn band_ratio_magnitude(a: f64, b: f64) -> f64 {
    let ratio = a / b;
    if ratio > 0.0 && ratio.is_finite() {
        2.5 * ratio.log10()
    } else {
        f64::NAN
    }
}

/// Known magnitude of a reference star at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeFixPoint {
    pub magnitude: f64,
    /// Wavelength in nm
    pub wavelength: f64,
}

/// Straight-line magnitude(wavelength) relation through fix points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeWavelengthFit {
    line: LinearFit,
}

impl MagnitudeWavelengthFit {
    pub fn fit(points: &[MagnitudeFixPoint]) -> Result<Self, FitError> {
        let wavelengths: Vec<f64> = points.iter().map(|p| p.wavelength).collect();
        let magnitudes: Vec<f64> = points.iter().map(|p| p.magnitude).collect();
        Ok(Self {
            line: LinearFit::fit(&wavelengths, &magnitudes)?,
        })
    }

    pub fn magnitude_at(&self, wavelength: f64) -> f64 {
        self.line.eval(wavelength)
    }

    /// Evaluate at several wavelengths, typically filter central wavelengths.
    pub fn magnitudes_at(&self, wavelengths: &[f64]) -> Vec<f64> {
        wavelengths.iter().map(|&w| self.magnitude_at(w)).collect()
    }

    pub fn line(&self) -> LinearFit {
        self.line
    }
}
