//! Image-level algorithms for disk and point-source photometry.
//!
//! # Module Organization
//!
//! ## Geometry and background
//! - **aperture**: Pixel membership for punctured apertures and annuli
//! - **background**: Sigma-clipped and plain median background levels
//! - **background_fit**: Quadratic sky surface under a source
//!
//! ## Measurement
//! - **photometry**: Flux over a grid of aperture perturbations
//! - **stokes**: Radial (Q_phi / U_phi) polarization
//! - **azimuthal**: Ring-averaged radial profiles
//!
//! ## Display
//! - **overlay**: RGBA aperture overlays and PNG export

pub mod aperture;
pub mod azimuthal;
pub mod background;
pub mod background_fit;
pub mod overlay;
pub mod photometry;
pub mod stokes;

pub use aperture::{aperture_mask, collect_aperture_regions, ApertureRegions};
pub use azimuthal::{azimuthal_profile, AzimuthalProfile, AzimuthalProfileIter, ProfileBin};
pub use background::{BackgroundStrategy, DEFAULT_CLIP_SIGMA};
pub use background_fit::polynomial_photometry;
pub use overlay::{colormap_set1_r, save_overlay_png, OverlayBuilder, DEFAULT_OVERLAY_ALPHA};
pub use photometry::{
    measure, measure_cell, measure_once, ApertureGeometry, CellFlux, GridCell, MeasureOptions,
    Measurement, PerturbationGrid, PhotometryError,
};
pub use stokes::{angle_phi, image_center, radial_polarization, RadialPolarization, StokesRotation};
