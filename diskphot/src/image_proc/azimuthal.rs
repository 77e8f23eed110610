//! Azimuthally averaged radial profiles.
//!
//! The profile is built from the inside out. Step `r` takes the disk of
//! radius `r + 1` around the image center, averages whatever pixels in it
//! are still finite, then marks the whole disk NaN in a working copy. Since
//! the inner disk was already consumed, step `r` effectively averages the
//! one-pixel ring `r ≤ d < r + 1` and no pixel lands in two bins.

use ndarray::{Array2, ArrayView2};
use phot_math::NanStats;
use serde::{Deserialize, Serialize};

use super::aperture::{in_aperture, pixel_distance};

/// One radius bin of an azimuthal profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileBin {
    pub radius: usize,
    /// NaN-aware mean of the ring
    pub mean: f64,
    /// NaN-aware population standard deviation of the ring
    pub std: f64,
    /// Finite pixels that contributed
    pub samples: usize,
}

/// Lazy profile over `radius = 0 .. min(rows, cols) / 2`.
///
/// The source image is never modified; consumed pixels are tracked in a
/// private working copy. [`restart`](Self::restart) rewinds to radius 0.
#[derive(Debug, Clone)]
pub struct AzimuthalProfileIter<'a> {
    source: ArrayView2<'a, f64>,
    working: Array2<f64>,
    center: (usize, usize),
    next_radius: usize,
    max_radius: usize,
}

impl<'a> AzimuthalProfileIter<'a> {
    pub fn new(image: ArrayView2<'a, f64>) -> Self {
        let (rows, cols) = image.dim();
        Self {
            working: image.to_owned(),
            source: image,
            center: (cols / 2, rows / 2),
            next_radius: 0,
            max_radius: rows.min(cols) / 2,
        }
    }

    /// Rewind to the innermost bin with a fresh copy of the source.
    pub fn restart(&mut self) {
        self.working = self.source.to_owned();
        self.next_radius = 0;
    }

    /// `(x, y)` center shared by every ring.
    pub fn center(&self) -> (usize, usize) {
        self.center
    }

    fn consume_disk(&mut self, radius: f64) -> NanStats {
        let (rows, cols) = self.working.dim();
        let (cx, cy) = (self.center.0 as f64, self.center.1 as f64);
        let reach = radius.ceil() as usize;

        let y_range = self.center.1.saturating_sub(reach)..(self.center.1 + reach + 1).min(rows);
        let x_range = self.center.0.saturating_sub(reach)..(self.center.0 + reach + 1).min(cols);

        let mut stats = NanStats::new();
        for y in y_range {
            for x in x_range.clone() {
                if in_aperture(pixel_distance(x, y, cx, cy), radius, 0.0) {
                    let pixel = &mut self.working[[y, x]];
                    stats.push(*pixel);
                    *pixel = f64::NAN;
                }
            }
        }
        stats
    }
}

impl Iterator for AzimuthalProfileIter<'_> {
    type Item = ProfileBin;

    fn next(&mut self) -> Option<ProfileBin> {
        if self.next_radius >= self.max_radius {
            return None;
        }

        let radius = self.next_radius;
        let stats = self.consume_disk((radius + 1) as f64);
        self.next_radius += 1;

        Some(ProfileBin {
            radius,
            mean: stats.mean(),
            std: stats.std(),
            samples: stats.count(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.max_radius - self.next_radius;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AzimuthalProfileIter<'_> {}

/// Materialized azimuthal profile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AzimuthalProfile {
    pub radius: Vec<usize>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl AzimuthalProfile {
    pub fn len(&self) -> usize {
        self.radius.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radius.is_empty()
    }
}

impl FromIterator<ProfileBin> for AzimuthalProfile {
    fn from_iter<I: IntoIterator<Item = ProfileBin>>(iter: I) -> Self {
        let mut profile = AzimuthalProfile::default();
        for bin in iter {
            profile.radius.push(bin.radius);
            profile.mean.push(bin.mean);
            profile.std.push(bin.std);
        }
        profile
    }
}

/// Full azimuthal profile of `image` about its center.
pub fn azimuthal_profile(image: ArrayView2<f64>) -> AzimuthalProfile {
    AzimuthalProfileIter::new(image).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::aperture::aperture_mask;

    #[test]
    fn test_profile_length() {
        let image = Array2::<f64>::zeros((40, 40));
        assert_eq!(azimuthal_profile(image.view()).len(), 20);

        let image = Array2::<f64>::zeros((21, 30));
        assert_eq!(AzimuthalProfileIter::new(image.view()).len(), 10);
    }

    #[test]
    fn test_radial_ramp_is_recovered() {
        let size = 64;
        let center = (size / 2) as f64;
        let image = Array2::from_shape_fn((size, size), |(y, x)| {
            pixel_distance(x, y, center, center).floor()
        });

        let profile = azimuthal_profile(image.view());

        for (r, &mean) in profile.mean.iter().enumerate() {
            assert_eq!(mean, r as f64, "ring {r}");
        }
        assert!(profile.std.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_rings_never_double_count() {
        let size = 30;
        let image = Array2::from_elem((size, size), 1.0);
        let iter = AzimuthalProfileIter::new(image.view());
        let (cx, cy) = iter.center();
        let bins: Vec<ProfileBin> = iter.collect();

        let mut coverage = Array2::<u32>::zeros((size, size));
        for bin in &bins {
            let ring = aperture_mask(
                (size, size),
                cx as f64,
                cy as f64,
                (bin.radius + 1) as f64,
                bin.radius as f64,
            );
            assert_eq!(
                ring.iter().filter(|&&v| v).count(),
                bin.samples,
                "ring {} pixel count",
                bin.radius
            );
            for (count, &hit) in coverage.iter_mut().zip(ring.iter()) {
                *count += hit as u32;
            }
        }

        let full_disk = aperture_mask((size, size), cx as f64, cy as f64, bins.len() as f64, 0.0);
        for (&count, &inside) in coverage.iter().zip(full_disk.iter()) {
            assert_eq!(count, inside as u32);
        }
    }

    #[test]
    fn test_source_nan_tolerated() {
        let mut image = Array2::from_elem((20, 20), 4.0);
        image[[10, 13]] = f64::NAN;

        let bins: Vec<ProfileBin> = AzimuthalProfileIter::new(image.view()).collect();

        assert_eq!(bins[3].mean, 4.0);
        assert!(image[[10, 13]].is_nan(), "source untouched");
        assert_eq!(image[[10, 10]], 4.0, "source untouched");
    }

    #[test]
    fn test_restart_reproduces_sequence() {
        let image = Array2::from_shape_fn((16, 16), |(y, x)| (x * y) as f64);
        let mut iter = AzimuthalProfileIter::new(image.view());

        let first: Vec<ProfileBin> = iter.by_ref().take(5).collect();
        iter.restart();
        let again: Vec<ProfileBin> = iter.take(5).collect();

        assert_eq!(first, again);
    }
}
