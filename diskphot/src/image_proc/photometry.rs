//! Aperture photometry over a grid of aperture perturbations.
//!
//! A single aperture placement gives one flux number with no error bar. To
//! estimate how sensitive that number is to where the aperture was drawn,
//! [`measure`] repeats the measurement for every combination of
//!
//! - center shifts `dx, dy ∈ [-displacement_range, displacement_range]`
//! - independent radius jitters `∈ [-scale_range, scale_range]` on the inner
//!   radius, the outer radius and (for punctured apertures) the hole radius
//!
//! and reduces the per-cell fluxes to a NaN-aware mean and population
//! standard deviation per channel.
//!
//! # Flux definition
//!
//! For each cell and channel:
//!
//! ```text
//! flux = Σ aperture pixels − N_aperture × background(annulus)
//! ```
//!
//! where the aperture is `hole ≤ d < inner`, the annulus is
//! `inner ≤ d < outer` and the background comes from the caller's
//! [`BackgroundStrategy`].
//!
//! # Tensor layout
//!
//! The optional full result tensor is indexed
//! `[dx, dy, (hole,) inner, outer, channel]` with each perturbation axis of
//! length `2·range + 1`, offset `−range` at index 0. The hole axis exists only
//! for punctured geometries.
//!
//! Grid size grows as `(2d+1)²·(2s+1)^k`; callers are expected to keep both
//! ranges small (1 is typical).

use ndarray::{ArrayD, ArrayView2, IxDyn};
use phot_math::{FitError, NanStats};
use rayon::prelude::*;
use thiserror::Error;

use super::aperture::collect_aperture_regions;
use super::background::BackgroundStrategy;

/// Errors from aperture photometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotometryError {
    /// Radii violate `0 <= hole <= inner < outer`. `hole` is set for
    /// punctured apertures.
    #[error("invalid aperture radii (hole {hole:?}, inner {inner}, outer {outer}): need 0 <= hole <= inner < outer")]
    InvalidGeometry {
        hole: Option<f64>,
        inner: f64,
        outer: f64,
    },

    #[error("at least one image channel is required")]
    NoChannels,

    #[error("channel {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Cut-out around a source does not fit inside the frame.
    #[error("{size}px cut-out at ({x}, {y}) extends past the {width}x{height} frame")]
    OutOfBounds {
        x: usize,
        y: usize,
        size: usize,
        width: usize,
        height: usize,
    },

    #[error("background fit failed: {0}")]
    BackgroundFit(#[from] FitError),
}

/// Annular (optionally punctured) aperture around a sub-pixel center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureGeometry {
    /// `(x, y)` = (column, row)
    pub center: (f64, f64),
    /// Hole radius of a punctured aperture, jittered on its own grid axis
    pub hole: Option<f64>,
    /// Outer edge of the measurement aperture, inner edge of the annulus
    pub inner: f64,
    /// Outer edge of the background annulus
    pub outer: f64,
}

impl ApertureGeometry {
    /// Filled measurement disk of radius `inner` with background annulus out
    /// to `outer`.
    pub fn new(center: (f64, f64), inner: f64, outer: f64) -> Result<Self, PhotometryError> {
        let geometry = Self {
            center,
            hole: None,
            inner,
            outer,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Measurement ring `hole ≤ d < inner` with background annulus out to
    /// `outer`.
    pub fn punctured(
        center: (f64, f64),
        hole: f64,
        inner: f64,
        outer: f64,
    ) -> Result<Self, PhotometryError> {
        let geometry = Self {
            center,
            hole: Some(hole),
            inner,
            outer,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<(), PhotometryError> {
        // Negated comparisons also reject NaN radii.
        let radii_ok = self.inner >= 0.0 && self.outer > self.inner;
        let hole_ok = self.hole.map_or(true, |hole| hole >= 0.0 && hole <= self.inner);
        if !(radii_ok && hole_ok) {
            return Err(PhotometryError::InvalidGeometry {
                hole: self.hole,
                inner: self.inner,
                outer: self.outer,
            });
        }
        Ok(())
    }

    pub fn is_punctured(&self) -> bool {
        self.hole.is_some()
    }

    /// Apply one grid cell's offsets.
    pub fn perturbed(&self, cell: &GridCell) -> PerturbedAperture {
        PerturbedAperture {
            cx: self.center.0 + cell.dx as f64,
            cy: self.center.1 + cell.dy as f64,
            hole: self.hole.map_or(0.0, |h| h + cell.hole as f64),
            inner: self.inner + cell.inner as f64,
            outer: self.outer + cell.outer as f64,
        }
    }
}

/// Concrete aperture after applying a perturbation. Radii are not
/// re-validated; jitter may produce empty regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbedAperture {
    pub cx: f64,
    pub cy: f64,
    pub hole: f64,
    pub inner: f64,
    pub outer: f64,
}

/// Offsets applied by one cell of the perturbation grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridCell {
    pub dx: i64,
    pub dy: i64,
    pub hole: i64,
    pub inner: i64,
    pub outer: i64,
}

/// Center-displacement and radius-jitter ranges for one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerturbationGrid {
    pub displacement_range: usize,
    pub scale_range: usize,
}

impl Default for PerturbationGrid {
    fn default() -> Self {
        Self {
            displacement_range: 1,
            scale_range: 1,
        }
    }
}

impl PerturbationGrid {
    /// Grid of `dx, dy ∈ [-displacement_range, displacement_range]` and
    /// radius jitters in `[-scale_range, scale_range]`.
    ///
    /// Ranges are not bounded here. [`axes`](Self::axes), [`len`](Self::len)
    /// and [`cells`](Self::cells) assume the grid fits in memory; check
    /// untrusted ranges with [`checked_len`](Self::checked_len) first.
    pub fn new(displacement_range: usize, scale_range: usize) -> Self {
        Self {
            displacement_range,
            scale_range,
        }
    }

    /// Single cell at the nominal geometry.
    pub fn fixed() -> Self {
        Self::new(0, 0)
    }

    /// Lengths of the perturbation axes (channel axis excluded).
    pub fn axes(&self, punctured: bool) -> Vec<usize> {
        let shift = 2 * self.displacement_range + 1;
        let jitter = 2 * self.scale_range + 1;
        let mut axes = vec![shift, shift];
        if punctured {
            axes.push(jitter);
        }
        axes.extend([jitter, jitter]);
        axes
    }

    /// Number of cells in the grid.
    pub fn len(&self, punctured: bool) -> usize {
        self.axes(punctured).iter().product()
    }

    /// Number of cells, or `None` if an axis length or the cell count
    /// overflows `usize` or an offset does not fit `i64`.
    pub fn checked_len(&self, punctured: bool) -> Option<usize> {
        let axis = |range: usize| {
            i64::try_from(range).ok()?;
            range.checked_mul(2)?.checked_add(1)
        };
        let shift = axis(self.displacement_range)?;
        let jitter = axis(self.scale_range)?;
        let jitter_axes = if punctured { 3 } else { 2 };
        (0..jitter_axes).try_fold(shift.checked_mul(shift)?, |cells, _| cells.checked_mul(jitter))
    }

    /// All cells in row-major tensor order.
    pub fn cells(&self, punctured: bool) -> Vec<GridCell> {
        let d = self.displacement_range as i64;
        let s = self.scale_range as i64;
        let holes: Vec<i64> = if punctured { (-s..=s).collect() } else { vec![0] };

        let mut cells = Vec::with_capacity(self.len(punctured));
        for dx in -d..=d {
            for dy in -d..=d {
                for &hole in &holes {
                    for inner in -s..=s {
                        for outer in -s..=s {
                            cells.push(GridCell {
                                dx,
                                dy,
                                hole,
                                inner,
                                outer,
                            });
                        }
                    }
                }
            }
        }
        cells
    }
}

/// Per-channel results of one aperture placement.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFlux {
    /// Raw sum over the measurement aperture
    pub total: Vec<f64>,
    /// `total − aperture_pixels × background`
    pub flux: Vec<f64>,
    /// Background level of the annulus
    pub background: Vec<f64>,
    pub aperture_pixels: usize,
    pub annulus_pixels: usize,
}

/// Options for [`measure`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasureOptions {
    pub grid: PerturbationGrid,
    pub background: BackgroundStrategy,
    /// Keep the full per-cell tensor
    pub return_full: bool,
    /// Report the NaN-aware mean background per channel
    pub return_background: bool,
}

/// Aggregated photometry over the perturbation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// NaN-aware mean flux per channel
    pub mean: Vec<f64>,
    /// NaN-aware population standard deviation per channel
    pub std: Vec<f64>,
    /// Number of grid cells evaluated
    pub cells: usize,
    /// Per-cell fluxes, see the module docs for the axis order
    pub full: Option<ArrayD<f64>>,
    /// NaN-aware mean background per channel
    pub background: Option<Vec<f64>>,
}

fn check_channels(channels: &[ArrayView2<f64>]) -> Result<(usize, usize), PhotometryError> {
    let expected = channels.first().ok_or(PhotometryError::NoChannels)?.dim();
    for (index, channel) in channels.iter().enumerate() {
        if channel.dim() != expected {
            return Err(PhotometryError::ShapeMismatch {
                index,
                expected,
                found: channel.dim(),
            });
        }
    }
    Ok(expected)
}

fn measure_perturbed(
    aperture: &PerturbedAperture,
    shape: (usize, usize),
    channels: &[ArrayView2<f64>],
    strategy: BackgroundStrategy,
) -> CellFlux {
    let regions = collect_aperture_regions(
        shape,
        aperture.cx,
        aperture.cy,
        aperture.hole,
        aperture.inner,
        aperture.outer,
    );
    let aperture_pixels = regions.aperture.len();

    let mut cell = CellFlux {
        total: Vec::with_capacity(channels.len()),
        flux: Vec::with_capacity(channels.len()),
        background: Vec::with_capacity(channels.len()),
        aperture_pixels,
        annulus_pixels: regions.annulus.len(),
    };

    for channel in channels {
        let (inside, annulus) = regions.values(channel);
        let total: f64 = inside.iter().sum();
        let background = strategy.estimate(&annulus);

        cell.total.push(total);
        cell.flux.push(total - aperture_pixels as f64 * background);
        cell.background.push(background);
    }

    cell
}

/// Photometry of a single grid cell.
///
/// Geometry is assumed valid; use [`measure_once`] for a checked
/// single-placement measurement.
pub fn measure_cell(
    geometry: &ApertureGeometry,
    cell: &GridCell,
    channels: &[ArrayView2<f64>],
    strategy: BackgroundStrategy,
) -> Result<CellFlux, PhotometryError> {
    let shape = check_channels(channels)?;
    Ok(measure_perturbed(
        &geometry.perturbed(cell),
        shape,
        channels,
        strategy,
    ))
}

/// Validated photometry at the nominal geometry only.
pub fn measure_once(
    geometry: &ApertureGeometry,
    channels: &[ArrayView2<f64>],
    strategy: BackgroundStrategy,
) -> Result<CellFlux, PhotometryError> {
    geometry.validate()?;
    measure_cell(geometry, &GridCell::default(), channels, strategy)
}

/// Measure background-subtracted flux for every perturbation of `geometry`
/// and aggregate per channel.
///
/// # Arguments
/// * `geometry` - Nominal aperture
/// * `channels` - Image planes sharing one shape; one flux per plane
/// * `options` - Grid ranges, background strategy and optional outputs
///
/// # Errors
/// * `InvalidGeometry` - rejected before any work is done
/// * `NoChannels` / `ShapeMismatch` - unusable channel list
///
/// Cells with a non-finite flux (e.g. an unusable background) are left out
/// of the mean and std. A channel with no finite cell reports NaN for both.
pub fn measure(
    geometry: &ApertureGeometry,
    channels: &[ArrayView2<f64>],
    options: &MeasureOptions,
) -> Result<Measurement, PhotometryError> {
    geometry.validate()?;
    let shape = check_channels(channels)?;

    let punctured = geometry.is_punctured();
    let cells = options.grid.cells(punctured);
    log::debug!(
        "photometry at ({:.1}, {:.1}) r=[{:?}, {}, {}]: {} cells x {} channels, {:?}",
        geometry.center.0,
        geometry.center.1,
        geometry.hole,
        geometry.inner,
        geometry.outer,
        cells.len(),
        channels.len(),
        options.background,
    );

    let strategy = options.background;
    let results: Vec<CellFlux> = cells
        .par_iter()
        .map(|cell| measure_perturbed(&geometry.perturbed(cell), shape, channels, strategy))
        .collect();

    let mut flux_stats = vec![NanStats::new(); channels.len()];
    let mut background_stats = vec![NanStats::new(); channels.len()];
    for cell in &results {
        for (stats, &flux) in flux_stats.iter_mut().zip(&cell.flux) {
            stats.push(flux);
        }
        for (stats, &background) in background_stats.iter_mut().zip(&cell.background) {
            stats.push(background);
        }
    }

    let mean: Vec<f64> = flux_stats.iter().map(NanStats::mean).collect();
    let std: Vec<f64> = flux_stats.iter().map(NanStats::std).collect();

    for (index, stats) in flux_stats.iter().enumerate() {
        if stats.count() == 0 {
            log::warn!("channel {index} unmeasurable: all {} cells non-finite", results.len());
        } else if stats.skipped() > 0 {
            log::debug!(
                "channel {index}: {} of {} cells non-finite",
                stats.skipped(),
                results.len()
            );
        }
    }

    let full = options.return_full.then(|| {
        let mut dims = options.grid.axes(punctured);
        dims.push(channels.len());
        let mut tensor = ArrayD::from_elem(IxDyn(&dims), f64::NAN);
        for (slot, &value) in tensor
            .iter_mut()
            .zip(results.iter().flat_map(|cell| cell.flux.iter()))
        {
            *slot = value;
        }
        tensor
    });

    let background = options
        .return_background
        .then(|| background_stats.iter().map(NanStats::mean).collect());

    Ok(Measurement {
        mean,
        std,
        cells: results.len(),
        full,
        background,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::aperture::{aperture_mask, pixel_distance};
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn radial_image(size: usize, center: f64, f: impl Fn(f64) -> f64) -> Array2<f64> {
        Array2::from_shape_fn((size, size), |(y, x)| f(pixel_distance(x, y, center, center)))
    }

    fn fixed_options(background: BackgroundStrategy) -> MeasureOptions {
        MeasureOptions {
            grid: PerturbationGrid::fixed(),
            background,
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_radii_rejected() {
        let result = ApertureGeometry::new((50.0, 50.0), 10.0, 10.0);
        assert_eq!(
            result,
            Err(PhotometryError::InvalidGeometry {
                hole: None,
                inner: 10.0,
                outer: 10.0
            })
        );
    }

    #[test]
    fn test_inverted_and_negative_radii_rejected() {
        assert!(matches!(
            ApertureGeometry::new((0.0, 0.0), 12.0, 5.0),
            Err(PhotometryError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            ApertureGeometry::new((0.0, 0.0), -1.0, 5.0),
            Err(PhotometryError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            ApertureGeometry::new((0.0, 0.0), 1.0, f64::NAN),
            Err(PhotometryError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_hole_larger_than_inner_rejected() {
        assert_eq!(
            ApertureGeometry::punctured((0.0, 0.0), 6.0, 5.0, 9.0),
            Err(PhotometryError::InvalidGeometry {
                hole: Some(6.0),
                inner: 5.0,
                outer: 9.0
            })
        );
        assert!(matches!(
            ApertureGeometry::punctured((0.0, 0.0), -1.0, 5.0, 9.0),
            Err(PhotometryError::InvalidGeometry { hole: Some(_), .. })
        ));
        assert!(ApertureGeometry::punctured((0.0, 0.0), 5.0, 5.0, 9.0).is_ok());
    }

    #[test]
    fn test_measure_revalidates_geometry() {
        let image = Array2::<f64>::zeros((20, 20));
        let geometry = ApertureGeometry {
            center: (10.0, 10.0),
            hole: None,
            inner: 4.0,
            outer: 4.0,
        };
        assert!(matches!(
            measure(&geometry, &[image.view()], &MeasureOptions::default()),
            Err(PhotometryError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_channel_checks() {
        let geometry = ApertureGeometry::new((5.0, 5.0), 2.0, 4.0).unwrap();
        assert_eq!(
            measure(&geometry, &[], &MeasureOptions::default()),
            Err(PhotometryError::NoChannels)
        );

        let a = Array2::<f64>::zeros((10, 10));
        let b = Array2::<f64>::zeros((10, 12));
        assert_eq!(
            measure(&geometry, &[a.view(), b.view()], &MeasureOptions::default()),
            Err(PhotometryError::ShapeMismatch {
                index: 1,
                expected: (10, 10),
                found: (10, 12)
            })
        );
    }

    #[test]
    fn test_grid_shapes() {
        let grid = PerturbationGrid::default();
        assert_eq!(grid.axes(false), vec![3, 3, 3, 3]);
        assert_eq!(grid.axes(true), vec![3, 3, 3, 3, 3]);
        assert_eq!(grid.len(false), 81);
        assert_eq!(grid.len(true), 243);
        assert_eq!(PerturbationGrid::fixed().len(true), 1);

        let cells = PerturbationGrid::new(2, 1).cells(false);
        assert_eq!(cells.len(), 5 * 5 * 3 * 3);
        assert_eq!(
            cells[0],
            GridCell {
                dx: -2,
                dy: -2,
                hole: 0,
                inner: -1,
                outer: -1
            }
        );
        // Outer jitter varies fastest.
        assert_eq!(cells[1].outer, 0);
        assert_eq!(cells[3].inner, 0);
    }

    #[test]
    fn test_punctured_cell_order() {
        let cells = PerturbationGrid::new(0, 1).cells(true);
        assert_eq!(cells.len(), 27);
        assert_eq!(
            cells[0],
            GridCell {
                dx: 0,
                dy: 0,
                hole: -1,
                inner: -1,
                outer: -1
            }
        );
        // Hole varies slowest of the jitter axes, outer fastest.
        assert_eq!((cells[1].hole, cells[1].inner, cells[1].outer), (-1, -1, 0));
        assert_eq!((cells[3].hole, cells[3].inner, cells[3].outer), (-1, 0, -1));
        assert_eq!((cells[9].hole, cells[9].inner, cells[9].outer), (0, -1, -1));
        assert_eq!((cells[26].hole, cells[26].inner, cells[26].outer), (1, 1, 1));
    }

    #[test]
    fn test_checked_len_rejects_huge_ranges() {
        assert_eq!(PerturbationGrid::default().checked_len(true), Some(243));
        assert_eq!(PerturbationGrid::new(2, 1).checked_len(false), Some(225));
        assert_eq!(PerturbationGrid::new(usize::MAX, 0).checked_len(false), None);
        assert_eq!(PerturbationGrid::new(0, usize::MAX / 2).checked_len(true), None);
        assert_eq!(PerturbationGrid::new(1 << 20, 1 << 10).checked_len(true), None);
    }

    #[test]
    fn test_full_tensor_separates_dx_from_dy() {
        // Single bright pixel three columns right of the nominal center.
        let mut image = Array2::<f64>::zeros((40, 40));
        image[[20, 23]] = 100.0;
        let geometry = ApertureGeometry::punctured((20.0, 20.0), 1.0, 3.0, 8.0).unwrap();
        let options = MeasureOptions {
            grid: PerturbationGrid::new(1, 0),
            background: BackgroundStrategy::Median,
            return_full: true,
            ..Default::default()
        };

        let full = measure(&geometry, &[image.view()], &options)
            .unwrap()
            .full
            .unwrap();

        assert_eq!(full.shape(), &[3, 3, 1, 1, 1, 1]);
        // dx = +1 brings the pixel inside r < 3 for every dy.
        for dy in 0..3 {
            assert_eq!(full[[2, dy, 0, 0, 0, 0]], 100.0);
        }
        // dx = -1 or 0 leaves it in the annulus, whatever dy.
        for dx in 0..2 {
            for dy in 0..3 {
                assert_eq!(full[[dx, dy, 0, 0, 0, 0]], 0.0);
            }
        }
    }

    #[test]
    fn test_full_tensor_hole_axis() {
        // Bright pixel at distance 2 from the center; hole jitters to 1, 2, 3.
        let mut image = Array2::<f64>::zeros((40, 40));
        image[[20, 22]] = 100.0;
        let geometry = ApertureGeometry::punctured((20.0, 20.0), 2.0, 5.0, 9.0).unwrap();
        let options = MeasureOptions {
            grid: PerturbationGrid::new(0, 1),
            background: BackgroundStrategy::Median,
            return_full: true,
            ..Default::default()
        };

        let result = measure(&geometry, &[image.view()], &options).unwrap();
        let full = result.full.unwrap();

        assert_eq!(full.shape(), &[1, 1, 3, 3, 3, 1]);
        for inner in 0..3 {
            for outer in 0..3 {
                assert_eq!(full[[0, 0, 0, inner, outer, 0]], 100.0);
                assert_eq!(full[[0, 0, 1, inner, outer, 0]], 100.0);
                // A hole of radius 3 swallows the pixel.
                assert_eq!(full[[0, 0, 2, inner, outer, 0]], 0.0);
            }
        }
        assert_relative_eq!(result.mean[0], 200.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_source_on_background_annulus() {
        // 10 inside r=5, 2 everywhere else.
        let image = radial_image(100, 50.0, |d| if d < 5.0 { 10.0 } else { 2.0 });
        let geometry = ApertureGeometry::new((50.0, 50.0), 5.0, 10.0).unwrap();

        let result = measure(&geometry, &[image.view()], &fixed_options(BackgroundStrategy::default()))
            .unwrap();

        let pixels = aperture_mask((100, 100), 50.0, 50.0, 5.0, 0.0)
            .iter()
            .filter(|&&v| v)
            .count();
        assert_eq!(result.cells, 1);
        assert_relative_eq!(result.mean[0], pixels as f64 * 8.0, epsilon = 1e-9);
        assert_eq!(result.std[0], 0.0);
    }

    #[test]
    fn test_fixed_grid_matches_direct_computation() {
        let image = Array2::from_shape_fn((40, 40), |(y, x)| (x * 3 + y * 7 % 11) as f64);
        let geometry = ApertureGeometry::new((18.4, 21.2), 4.5, 9.0).unwrap();
        let strategy = BackgroundStrategy::Median;

        let result = measure(&geometry, &[image.view()], &fixed_options(strategy)).unwrap();
        let direct = measure_once(&geometry, &[image.view()], strategy).unwrap();

        assert_eq!(result.mean[0], direct.flux[0]);
        assert_eq!(result.std[0], 0.0);
    }

    #[test]
    fn test_flat_image_has_zero_flux_everywhere() {
        let image = Array2::from_elem((64, 64), 7.5);
        let geometry = ApertureGeometry::punctured((32.0, 32.0), 2.0, 6.0, 12.0).unwrap();
        let options = MeasureOptions {
            background: BackgroundStrategy::Median,
            return_full: true,
            return_background: true,
            ..Default::default()
        };

        let result = measure(&geometry, &[image.view(), image.view()], &options).unwrap();

        assert_eq!(result.cells, 243);
        assert_eq!(result.mean, vec![0.0, 0.0]);
        assert_eq!(result.std, vec![0.0, 0.0]);
        assert_eq!(result.background, Some(vec![7.5, 7.5]));
        let full = result.full.unwrap();
        assert_eq!(full.shape(), &[3, 3, 3, 3, 3, 2]);
        assert!(full.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_unusable_annulus_cells_excluded() {
        // Finite source out to r=7, NaN ring 7..10, flat beyond.
        let image = radial_image(60, 30.0, |d| {
            if d < 7.0 {
                10.0
            } else if d < 10.0 {
                f64::NAN
            } else {
                2.0
            }
        });
        let geometry = ApertureGeometry::new((30.0, 30.0), 6.0, 9.0).unwrap();
        let options = MeasureOptions {
            grid: PerturbationGrid::new(0, 1),
            return_full: true,
            ..Default::default()
        };

        let result = measure(&geometry, &[image.view()], &options).unwrap();
        let full = result.full.unwrap();

        // inner = 7 leaves only the NaN ring in every annulus.
        for outer in 0..3 {
            assert!(full[[0, 0, 2, outer, 0]].is_nan());
            assert_eq!(full[[0, 0, 0, outer, 0]], 0.0);
            assert_eq!(full[[0, 0, 1, outer, 0]], 0.0);
        }
        assert_eq!(result.mean[0], 0.0);
        assert_eq!(result.std[0], 0.0);
    }

    #[test]
    fn test_all_cells_unusable_reports_nan() {
        let image = radial_image(60, 30.0, |d| if d < 5.0 { 10.0 } else { f64::NAN });
        let geometry = ApertureGeometry::new((30.0, 30.0), 5.0, 10.0).unwrap();

        let result = measure(&geometry, &[image.view()], &fixed_options(BackgroundStrategy::default()))
            .unwrap();

        assert!(result.mean[0].is_nan());
        assert!(result.std[0].is_nan());
    }

    #[test]
    fn test_displacement_spreads_results() {
        let image = radial_image(80, 40.0, |d| if d < 4.0 { 100.0 } else { 0.0 });
        let geometry = ApertureGeometry::new((40.0, 40.0), 5.0, 12.0).unwrap();
        let options = MeasureOptions {
            grid: PerturbationGrid::new(2, 0),
            background: BackgroundStrategy::Median,
            ..Default::default()
        };

        let result = measure(&geometry, &[image.view()], &options).unwrap();

        assert_eq!(result.cells, 25);
        // Shifting by 2 px clips part of the r=4 source from the r=5 aperture.
        assert!(result.std[0] > 0.0);
        let nominal = measure_once(&geometry, &[image.view()], BackgroundStrategy::Median).unwrap();
        assert!(result.mean[0] < nominal.flux[0]);
    }

    #[test]
    fn test_cell_totals_and_pixel_counts() {
        let image = Array2::from_elem((30, 30), 1.0);
        let geometry = ApertureGeometry::new((15.0, 15.0), 3.0, 6.0).unwrap();
        let cell = measure_once(&geometry, &[image.view()], BackgroundStrategy::Median).unwrap();

        assert_eq!(cell.total[0], cell.aperture_pixels as f64);
        assert_eq!(cell.background[0], 1.0);
        assert_eq!(cell.flux[0], 0.0);
        assert!(cell.annulus_pixels > cell.aperture_pixels);
    }
}
