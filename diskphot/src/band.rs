//! Photometric bands and their multi-plane image stacks.
//!
//! Every band of an observation carries the same four planes in a fixed
//! order: total intensity, Stokes Q, a secondary intensity frame and
//! Stokes U. The radial Stokes decomposition and the measurement facade
//! index planes through [`StokesPlane`] and rely on this order.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while assembling a band stack.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BandStackError {
    #[error("band stack needs at least {} planes, got {found}", StokesPlane::COUNT)]
    TooFewPlanes { found: usize },

    #[error("plane shape {found:?} does not match stack shape {expected:?}")]
    PlaneShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Observational filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    I,
    R,
}

impl Band {
    /// Bands in storage order.
    pub const ALL: [Band; 2] = [Band::I, Band::R];

    pub fn index(self) -> usize {
        match self {
            Band::I => 0,
            Band::R => 1,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::I => write!(f, "I'-band"),
            Band::R => write!(f, "R'-band"),
        }
    }
}

/// Plane index within a band stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StokesPlane {
    Intensity = 0,
    Q = 1,
    Secondary = 2,
    U = 3,
}

impl StokesPlane {
    pub const COUNT: usize = 4;
}

/// Immutable planes × rows × cols cube for one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStack {
    band: Band,
    planes: Array3<f64>,
}

impl BandStack {
    /// Wrap a `(planes, rows, cols)` cube. Extra planes beyond the four
    /// conventional ones are kept but never indexed.
    pub fn new(band: Band, planes: Array3<f64>) -> Result<Self, BandStackError> {
        let found = planes.len_of(Axis(0));
        if found < StokesPlane::COUNT {
            return Err(BandStackError::TooFewPlanes { found });
        }
        Ok(Self { band, planes })
    }

    /// Stack the four conventional planes, checking they share one shape.
    pub fn from_planes(band: Band, planes: [Array2<f64>; 4]) -> Result<Self, BandStackError> {
        let expected = planes[0].dim();
        if let Some(bad) = planes.iter().find(|p| p.dim() != expected) {
            return Err(BandStackError::PlaneShape {
                expected,
                found: bad.dim(),
            });
        }

        let views: Vec<ArrayView2<f64>> = planes.iter().map(|p| p.view()).collect();
        let cube = ndarray::stack(Axis(0), &views).map_err(|_| BandStackError::PlaneShape {
            expected,
            found: expected,
        })?;
        Self::new(band, cube)
    }

    /// Re-check the plane count, e.g. after deserializing.
    pub fn validate(&self) -> Result<(), BandStackError> {
        let found = self.planes.len_of(Axis(0));
        if found < StokesPlane::COUNT {
            return Err(BandStackError::TooFewPlanes { found });
        }
        Ok(())
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn plane(&self, plane: StokesPlane) -> ArrayView2<'_, f64> {
        self.planes.index_axis(Axis(0), plane as usize)
    }

    /// `(rows, cols)` shared by every plane.
    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.planes.dim();
        (rows, cols)
    }

    pub fn planes(&self) -> &Array3<f64> {
        &self.planes
    }
}
