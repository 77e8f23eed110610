//! Observation model and the disk/object measurement facade.
//!
//! An [`Observation`] owns the two band stacks of one object, the disk and
//! point-object targets, the per-band filter reduction and, once
//! [`reduce`](Observation::reduce) has run or a saved bundle has been loaded,
//! the [`DerivedProducts`]. Derived state never appears implicitly: every
//! operation that needs it fails with [`ObservationError::NotReduced`]
//! until it is present.
//!
//! Background policy per call path:
//!
//! | operation                  | planes                | background          |
//! |----------------------------|-----------------------|---------------------|
//! | `measure_disk`             | Q_phi, both bands     | plain median        |
//! | `measure_objects`          | intensity, both bands | plain median        |
//! | `disk_photometry`          | Q_phi, both bands     | plain median        |
//! | `point_source_photometry`  | planes 0 and 2 / band | sigma-clipped median|

use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2};
use rayon::prelude::*;
use thiserror::Error;

use crate::band::{Band, BandStack, StokesPlane};
use crate::image_proc::aperture::aperture_mask;
use crate::image_proc::azimuthal::{azimuthal_profile, AzimuthalProfile};
use crate::image_proc::background::BackgroundStrategy;
use crate::image_proc::overlay::OverlayBuilder;
use crate::image_proc::photometry::{
    measure, measure_once, ApertureGeometry, MeasureOptions, Measurement, PerturbationGrid,
    PhotometryError,
};
use crate::image_proc::stokes::StokesRotation;
use crate::magnitude::band_ratio_magnitude;
use crate::persist::{self, DerivedProducts, FrameBundle, PersistError};
use crate::target::Target;

#[derive(Error, Debug)]
pub enum ObservationError {
    #[error("no target named {0:?} is assigned")]
    MissingTarget(String),

    #[error("derived products not available, run reduce or load a saved bundle first")]
    NotReduced,

    #[error("band stacks disagree: {0}")]
    BandShape(String),

    #[error(transparent)]
    Photometry(#[from] PhotometryError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Name used in [`ObservationError::MissingTarget`] for the disk.
pub const DISK_TARGET: &str = "disk";

/// Single-placement readout of the disk annulus in both bands.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskMeasurement {
    /// `(rows, cols, 4)` RGBA overlay
    pub overlay: Array3<f64>,
    pub total_counts: [f64; 2],
    pub background_subtracted: [f64; 2],
    pub background_medians: [f64; 2],
    pub aperture_pixels: usize,
}

impl DiskMeasurement {
    /// `2.5·log10(I / R)` of the background-subtracted counts.
    pub fn color_magnitude(&self) -> f64 {
        band_ratio_magnitude(self.background_subtracted[0], self.background_subtracted[1])
    }
}

/// Counts for one point object in both bands.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCounts {
    pub name: String,
    pub total_counts: [f64; 2],
    pub background_subtracted: [f64; 2],
    pub background_medians: [f64; 2],
}

/// Readout of every point object plus a combined overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeasurement {
    pub overlay: Array3<f64>,
    pub objects: Vec<ObjectCounts>,
}

fn band_pair(values: &[f64]) -> [f64; 2] {
    [values[0], values[1]]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    name: String,
    bands: [BandStack; 2],
    disk: Option<Target>,
    objects: Vec<Target>,
    filter_reduction: [f64; 2],
    derived: Option<DerivedProducts>,
}

impl Observation {
    /// Pair an I-band and an R-band stack of identical frame shape.
    pub fn new(
        name: impl Into<String>,
        i_band: BandStack,
        r_band: BandStack,
    ) -> Result<Self, ObservationError> {
        for (stack, expected) in [(&i_band, Band::I), (&r_band, Band::R)] {
            if stack.band() != expected {
                return Err(ObservationError::BandShape(format!(
                    "expected {expected} stack, got {}",
                    stack.band()
                )));
            }
        }
        if i_band.shape() != r_band.shape() {
            return Err(ObservationError::BandShape(format!(
                "{} frames are {:?}, {} frames are {:?}",
                Band::I,
                i_band.shape(),
                Band::R,
                r_band.shape()
            )));
        }

        Ok(Self {
            name: name.into(),
            bands: [i_band, r_band],
            disk: None,
            objects: Vec::new(),
            filter_reduction: [1.0, 1.0],
            derived: None,
        })
    }

    pub fn from_bundle(bundle: FrameBundle) -> Result<Self, ObservationError> {
        let FrameBundle { name, bands } = bundle;
        let [i_band, r_band]: [BandStack; 2] = bands.try_into().map_err(|b: Vec<BandStack>| {
            ObservationError::BandShape(format!("expected 2 band stacks, got {}", b.len()))
        })?;
        Self::new(name, i_band, r_band)
    }

    pub fn to_bundle(&self) -> FrameBundle {
        FrameBundle {
            name: self.name.clone(),
            bands: self.bands.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(rows, cols)` shared by every plane of both bands.
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }

    pub fn band(&self, band: Band) -> &BandStack {
        &self.bands[band.index()]
    }

    pub fn disk(&self) -> Option<&Target> {
        self.disk.as_ref()
    }

    pub fn set_disk(&mut self, disk: Target) {
        self.disk = Some(disk);
    }

    pub fn objects(&self) -> &[Target] {
        &self.objects
    }

    pub fn add_object(&mut self, object: Target) {
        self.objects.push(object);
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
    }

    pub fn object(&self, name: &str) -> Option<&Target> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Per-band divisor applied to point-source planes.
    pub fn filter_reduction(&self) -> [f64; 2] {
        self.filter_reduction
    }

    pub fn set_filter_reduction(&mut self, reduction: [f64; 2]) {
        self.filter_reduction = reduction;
    }

    /// Header line followed by one line per object.
    pub fn describe_objects(&self) -> String {
        let mut out = format!("The following objects are marked in {}:", self.name);
        for object in &self.objects {
            out.push('\n');
            out.push_str(&object.describe());
        }
        out
    }

    /// Compute radial polarization and all azimuthal profiles, replacing
    /// any previously held derived products.
    pub fn reduce(&mut self) -> &DerivedProducts {
        log::info!("reducing {} ({:?} frames)", self.name, self.shape());

        let rotation = StokesRotation::centered(self.shape());
        let radial: Vec<_> = self.bands.iter().map(|b| rotation.decompose(b)).collect();

        let raw_planes: Vec<ArrayView2<f64>> = self
            .bands
            .iter()
            .flat_map(|b| [b.plane(StokesPlane::Intensity), b.plane(StokesPlane::Secondary)])
            .collect();
        let azimuthal: Vec<AzimuthalProfile> = raw_planes
            .par_iter()
            .map(|plane| azimuthal_profile(plane.view()))
            .collect();
        let azimuthal_qphi: Vec<AzimuthalProfile> = radial
            .par_iter()
            .map(|r| azimuthal_profile(r.q_phi.view()))
            .collect();

        self.derived.insert(DerivedProducts {
            radial,
            azimuthal,
            azimuthal_qphi,
        })
    }

    pub fn is_reduced(&self) -> bool {
        self.derived.is_some()
    }

    pub fn derived(&self) -> Result<&DerivedProducts, ObservationError> {
        self.derived.as_ref().ok_or(ObservationError::NotReduced)
    }

    /// Adopt externally computed or loaded products after checking they
    /// belong to this observation's frame shape.
    pub fn set_derived(&mut self, products: DerivedProducts) -> Result<(), ObservationError> {
        products.validate_for(self.shape())?;
        self.derived = Some(products);
        Ok(())
    }

    pub fn clear_derived(&mut self) {
        self.derived = None;
    }

    pub fn save_derived(&self, path: &Path) -> Result<(), ObservationError> {
        persist::save_derived(self.derived()?, path)?;
        Ok(())
    }

    pub fn load_derived(&mut self, path: &Path) -> Result<(), ObservationError> {
        let products = persist::load_derived(path)?;
        self.set_derived(products)
    }

    fn disk_target(&self) -> Result<&Target, ObservationError> {
        self.disk
            .as_ref()
            .ok_or_else(|| ObservationError::MissingTarget(DISK_TARGET.to_string()))
    }

    fn q_phi_channels(&self) -> Result<Vec<ArrayView2<'_, f64>>, ObservationError> {
        Ok(self.derived()?.radial.iter().map(|r| r.q_phi.view()).collect())
    }

    /// Counts of the disk ring `inner ≤ d < middle` on Q_phi of both bands,
    /// background from the plain median of `middle ≤ d < outer`.
    ///
    /// # Errors
    /// * `MissingTarget` - no disk assigned
    /// * `NotReduced` - no derived products
    /// * `Photometry` - radii not ordered `0 ≤ inner ≤ middle < outer`
    pub fn measure_disk(
        &self,
        inner: f64,
        middle: f64,
        outer: f64,
        alpha: f64,
    ) -> Result<DiskMeasurement, ObservationError> {
        let disk = self.disk_target()?;
        let channels = self.q_phi_channels()?;
        let geometry = ApertureGeometry::punctured(disk.center(), inner, middle, outer)?;

        let cell = measure_once(&geometry, &channels, BackgroundStrategy::Median)?;

        let shape = self.shape();
        let (cx, cy) = disk.center();
        let mut overlay = OverlayBuilder::new(shape, alpha);
        overlay.add_regions(
            &aperture_mask(shape, cx, cy, middle, inner),
            &aperture_mask(shape, cx, cy, outer, middle),
        );

        Ok(DiskMeasurement {
            overlay: overlay.finish(),
            total_counts: band_pair(&cell.total),
            background_subtracted: band_pair(&cell.flux),
            background_medians: band_pair(&cell.background),
            aperture_pixels: cell.aperture_pixels,
        })
    }

    /// Counts of every object on intensity plane 0 of both bands.
    ///
    /// No objects yields an empty list and a transparent overlay.
    pub fn measure_objects(
        &self,
        inner: f64,
        outer: f64,
        alpha: f64,
    ) -> Result<ObjectMeasurement, ObservationError> {
        let shape = self.shape();
        let channels: Vec<ArrayView2<f64>> = self
            .bands
            .iter()
            .map(|b| b.plane(StokesPlane::Intensity))
            .collect();

        let mut overlay = OverlayBuilder::new(shape, alpha);
        let mut objects = Vec::with_capacity(self.objects.len());

        for object in &self.objects {
            let geometry = ApertureGeometry::new(object.center(), inner, outer)?;
            let cell = measure_once(&geometry, &channels, BackgroundStrategy::Median)?;

            let (cx, cy) = object.center();
            overlay.add_regions(
                &aperture_mask(shape, cx, cy, inner, 0.0),
                &aperture_mask(shape, cx, cy, outer, inner),
            );

            objects.push(ObjectCounts {
                name: object.name.clone(),
                total_counts: band_pair(&cell.total),
                background_subtracted: band_pair(&cell.flux),
                background_medians: band_pair(&cell.background),
            });
        }

        Ok(ObjectMeasurement {
            overlay: overlay.finish(),
            objects,
        })
    }

    /// Grid photometry of the punctured disk aperture on Q_phi of both
    /// bands with plain-median background.
    pub fn disk_photometry(
        &self,
        hole: f64,
        inner: f64,
        outer: f64,
        grid: PerturbationGrid,
        return_full: bool,
        return_background: bool,
    ) -> Result<Measurement, ObservationError> {
        let disk = self.disk_target()?;
        let channels = self.q_phi_channels()?;
        let geometry = ApertureGeometry::punctured(disk.center(), hole, inner, outer)?;

        let options = MeasureOptions {
            grid,
            background: BackgroundStrategy::Median,
            return_full,
            return_background,
        };
        Ok(measure(&geometry, &channels, &options)?)
    }

    /// Grid photometry at `center` on four channels (band I planes 0 and 2,
    /// band R planes 0 and 2), each divided by its band's filter reduction,
    /// with sigma-clipped median background.
    pub fn point_source_photometry(
        &self,
        center: (f64, f64),
        inner: f64,
        outer: f64,
        grid: PerturbationGrid,
        return_full: bool,
        clip_sigma: f64,
    ) -> Result<Measurement, ObservationError> {
        let geometry = ApertureGeometry::new(center, inner, outer)?;

        let scaled: Vec<Array2<f64>> = self
            .bands
            .iter()
            .zip(self.filter_reduction)
            .flat_map(|(band, reduction)| {
                [StokesPlane::Intensity, StokesPlane::Secondary]
                    .map(|plane| band.plane(plane).mapv(|v| v / reduction))
            })
            .collect();
        let channels: Vec<ArrayView2<f64>> = scaled.iter().map(|c| c.view()).collect();

        let options = MeasureOptions {
            grid,
            background: BackgroundStrategy::SigmaClippedMedian { sigma: clip_sigma },
            return_full,
            return_background: false,
        };
        Ok(measure(&geometry, &channels, &options)?)
    }

    /// [`point_source_photometry`](Self::point_source_photometry) at a
    /// named object.
    pub fn object_photometry(
        &self,
        name: &str,
        inner: f64,
        outer: f64,
        grid: PerturbationGrid,
        return_full: bool,
        clip_sigma: f64,
    ) -> Result<Measurement, ObservationError> {
        let object = self
            .object(name)
            .ok_or_else(|| ObservationError::MissingTarget(name.to_string()))?;
        self.point_source_photometry(object.center(), inner, outer, grid, return_full, clip_sigma)
    }
}
