//! Aperture photometry and polarimetric reduction of circumstellar disk
//! imaging.
//!
//! An [`Observation`] pairs the I- and R-band stacks of one object (each
//! with intensity, Stokes Q, secondary intensity and Stokes U planes) with
//! the disk and point-object targets marked on it. From there:
//!
//! - [`Observation::reduce`] computes the radial Stokes images (Q_phi,
//!   U_phi) and the azimuthal profiles, which can be saved and reloaded
//!   with [`persist`]
//! - [`Observation::measure_disk`] and [`Observation::measure_objects`]
//!   give single-placement counts plus a display overlay
//! - [`Observation::disk_photometry`] and
//!   [`Observation::point_source_photometry`] sweep a grid of aperture
//!   perturbations and report mean flux with its spread
//!
//! The image-level algorithms live in [`image_proc`] and work on plain
//! `ndarray` views.

pub mod band;
pub mod config;
pub mod image_proc;
pub mod magnitude;
pub mod observation;
pub mod persist;
pub mod target;
pub mod test_util;

pub use band::{Band, BandStack, BandStackError, StokesPlane};
pub use config::{ConfigError, ObservationConfig, PhotometryDefaults};
pub use image_proc::{
    ApertureGeometry, BackgroundStrategy, Measurement, PerturbationGrid, PhotometryError,
};
pub use magnitude::{band_ratio_magnitude, MagnitudeFixPoint, MagnitudeWavelengthFit};
pub use observation::{
    DiskMeasurement, ObjectCounts, ObjectMeasurement, Observation, ObservationError,
};
pub use persist::{DerivedProducts, FrameBundle, PersistError};
pub use target::Target;
