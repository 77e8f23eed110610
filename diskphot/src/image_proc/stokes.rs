//! Radial Stokes decomposition.
//!
//! Rotates the linear polarization planes Q and U into the frame of the
//! position angle φ around a reference center:
//!
//! ```text
//! Q_phi = −Q·cos 2φ + U·sin 2φ
//! U_phi =  Q·sin 2φ + U·cos 2φ
//! ```
//!
//! Light scattered by a circumstellar disk is polarized tangentially and
//! shows up as positive Q_phi, while U_phi carries mostly noise.

use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

use crate::band::{BandStack, StokesPlane};

/// Position angle `φ = atan((x − x0) / (y − y0))` for every pixel.
///
/// Pixels on the row `y = y0` are never divided: left of `x0` they take
/// `atan(−∞) = −π/2`, right of it `atan(+∞) = π/2`, and the center itself
/// stays at 0. Pixels on the column `x = x0` (off the center row) divide
/// to zero.
pub fn angle_phi(shape: (usize, usize), x0: usize, y0: usize) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(y, x)| {
        let ratio = if y != y0 {
            (x as f64 - x0 as f64) / (y as f64 - y0 as f64)
        } else if x < x0 {
            f64::NEG_INFINITY
        } else if x > x0 {
            f64::INFINITY
        } else {
            0.0
        };
        ratio.atan()
    })
}

/// Reference center used for an image of `shape`: `(cols / 2, rows / 2)`.
pub fn image_center(shape: (usize, usize)) -> (usize, usize) {
    (shape.1 / 2, shape.0 / 2)
}

/// Radial (Q_phi) and tangential (U_phi) polarized intensity of one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialPolarization {
    pub q_phi: Array2<f64>,
    pub u_phi: Array2<f64>,
}

/// Precomputed `sin 2φ` / `cos 2φ` fields for one image shape and center.
///
/// All bands of an observation share one pixel grid, so the trigonometry is
/// done once and applied to each band.
#[derive(Debug, Clone)]
pub struct StokesRotation {
    sin_2phi: Array2<f64>,
    cos_2phi: Array2<f64>,
}

impl StokesRotation {
    pub fn new(shape: (usize, usize), x0: usize, y0: usize) -> Self {
        let phi = angle_phi(shape, x0, y0);
        Self {
            sin_2phi: phi.mapv(|p| (2.0 * p).sin()),
            cos_2phi: phi.mapv(|p| (2.0 * p).cos()),
        }
    }

    /// Rotation about the image center.
    pub fn centered(shape: (usize, usize)) -> Self {
        let (x0, y0) = image_center(shape);
        Self::new(shape, x0, y0)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.sin_2phi.dim()
    }

    /// Rotate a Q/U pair. Both planes must match the rotation's shape.
    pub fn apply(&self, q: &ArrayView2<f64>, u: &ArrayView2<f64>) -> RadialPolarization {
        let mut q_phi = Array2::zeros(self.shape());
        let mut u_phi = Array2::zeros(self.shape());

        Zip::from(&mut q_phi)
            .and(&mut u_phi)
            .and(q)
            .and(u)
            .and(&self.sin_2phi)
            .and(&self.cos_2phi)
            .for_each(|qp, up, &q, &u, &s, &c| {
                *qp = -q * c + u * s;
                *up = q * s + u * c;
            });

        RadialPolarization { q_phi, u_phi }
    }

    /// Decompose the Q and U planes of a band stack.
    pub fn decompose(&self, stack: &BandStack) -> RadialPolarization {
        self.apply(&stack.plane(StokesPlane::Q), &stack.plane(StokesPlane::U))
    }
}

/// Radial Stokes images of `stack` about its image center.
pub fn radial_polarization(stack: &BandStack) -> RadialPolarization {
    StokesRotation::centered(stack.shape()).decompose(stack)
}
