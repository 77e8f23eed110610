//! Photometry against a fitted smooth background.
//!
//! Where the sky under a source has a gradient (a nearby bright star, the
//! wing of the disk) a single annulus level is biased. Here a quadratic
//! surface is fitted to every pixel of a square cut-out outside the source
//! disk and subtracted before summing the source.

use ndarray::{s, ArrayView2};
use phot_math::QuadraticSurface;

use super::photometry::PhotometryError;

/// Background-subtracted sum of the disk of radius `inner` around `pos`.
///
/// # Arguments
/// * `inner` - Source radius; pixels with `dx² + dy² ≤ inner²` are summed
/// * `outer` - Half-width of the square cut-out used for the fit
/// * `pos` - `(x, y)` pixel position of the source
/// * `image` - Frame to measure
///
/// Offsets are taken relative to the cut-out center `(pos.x, pos.y)`.
/// Non-finite pixels are left out of the fit.
///
/// # Errors
/// * `InvalidGeometry` - `inner` negative or not below `outer`
/// * `OutOfBounds` - cut-out extends past the frame
/// * `BackgroundFit` - the background pixels do not constrain the surface
pub fn polynomial_photometry(
    inner: f64,
    outer: usize,
    pos: (usize, usize),
    image: ArrayView2<f64>,
) -> Result<f64, PhotometryError> {
    if !(inner >= 0.0 && inner < outer as f64) {
        return Err(PhotometryError::InvalidGeometry {
            hole: None,
            inner,
            outer: outer as f64,
        });
    }

    let (height, width) = image.dim();
    let (x, y) = pos;
    if x < outer || y < outer || x + outer > width || y + outer > height {
        return Err(PhotometryError::OutOfBounds {
            x,
            y,
            size: 2 * outer,
            width,
            height,
        });
    }

    let cutout = image.slice(s![y - outer..y + outer, x - outer..x + outer]);
    let inner_sq = inner * inner;
    let offset = |idx: usize| idx as f64 - outer as f64;

    let mut source = Vec::new();
    let mut samples = Vec::new();
    for ((row, col), &value) in cutout.indexed_iter() {
        let (dx, dy) = (offset(col), offset(row));
        if dx * dx + dy * dy <= inner_sq {
            source.push((dx, dy, value));
        } else if value.is_finite() {
            samples.push((dx, dy, value));
        }
    }

    let surface = QuadraticSurface::fit(&samples)?;
    log::debug!(
        "background surface at ({x}, {y}) from {} pixels: {:?}",
        samples.len(),
        surface.coefficients
    );

    Ok(source
        .iter()
        .map(|&(dx, dy, value)| value - surface.eval(dx, dy))
        .sum())
}
