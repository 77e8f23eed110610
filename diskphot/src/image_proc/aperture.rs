//! Aperture geometry on the pixel grid.
//!
//! A pixel belongs to an aperture of radius `radius` with a central hole of
//! radius `hole` when the Euclidean distance from its integer position to the
//! (possibly sub-pixel) center satisfies `hole <= distance < radius`. Full
//! masks are available for display and testing; the photometry engine walks
//! only the bounding box of the outermost radius instead.

use ndarray::{Array2, ArrayView2};

/// Distance from pixel `(x, y)` (column, row) to `(cx, cy)`.
#[inline]
pub fn pixel_distance(x: usize, y: usize, cx: f64, cy: f64) -> f64 {
    let dx = x as f64 - cx;
    let dy = y as f64 - cy;
    (dx * dx + dy * dy).sqrt()
}

/// Membership test shared by masks and the bounded walker.
#[inline]
pub fn in_aperture(distance: f64, radius: f64, hole: f64) -> bool {
    hole <= distance && distance < radius
}

/// Boolean mask of pixels with `hole <= distance < radius` from `(cx, cy)`.
///
/// # Arguments
/// * `shape` - `(rows, cols)` of the image the mask applies to
/// * `cx` - Center column (may be sub-pixel)
/// * `cy` - Center row (may be sub-pixel)
/// * `radius` - Exclusive outer radius
/// * `hole` - Inclusive inner radius, 0 for a filled disk
///
/// A degenerate geometry (`radius <= hole`) yields an all-false mask.
pub fn aperture_mask(shape: (usize, usize), cx: f64, cy: f64, radius: f64, hole: f64) -> Array2<bool> {
    Array2::from_shape_fn(shape, |(y, x)| {
        in_aperture(pixel_distance(x, y, cx, cy), radius, hole)
    })
}

/// Pixel indices of a measurement aperture and its background annulus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureRegions {
    /// `(row, col)` of pixels with `hole <= d < inner`
    pub aperture: Vec<(usize, usize)>,
    /// `(row, col)` of pixels with `inner <= d < outer`
    pub annulus: Vec<(usize, usize)>,
}

impl ApertureRegions {
    /// Gather the pixel values of both regions from `image`.
    pub fn values(&self, image: &ArrayView2<f64>) -> (Vec<f64>, Vec<f64>) {
        let aperture = self.aperture.iter().map(|&idx| image[idx]).collect();
        let annulus = self.annulus.iter().map(|&idx| image[idx]).collect();
        (aperture, annulus)
    }
}

/// Half-open index range covering `center ± radius`, clipped to `[0, len)`.
fn clipped_span(center: f64, radius: f64, len: usize) -> std::ops::Range<usize> {
    let lo = (center - radius).floor().max(0.0);
    let hi = ((center + radius).ceil() + 1.0).min(len as f64);
    if lo >= hi {
        return 0..0;
    }
    lo as usize..hi as usize
}

/// Classify the pixels around `(cx, cy)` into a (possibly punctured)
/// measurement aperture and the background annulus just outside it.
///
/// Only the bounding box of `max(inner, outer)` is visited, so the cost
/// scales with the aperture area rather than the frame size. Radii that are
/// negative or inverted simply produce empty regions.
pub fn collect_aperture_regions(
    shape: (usize, usize),
    cx: f64,
    cy: f64,
    hole: f64,
    inner: f64,
    outer: f64,
) -> ApertureRegions {
    let (height, width) = shape;
    let reach = inner.max(outer).max(0.0);

    let mut regions = ApertureRegions::default();

    for y in clipped_span(cy, reach, height) {
        for x in clipped_span(cx, reach, width) {
            let distance = pixel_distance(x, y, cx, cy);

            if in_aperture(distance, inner, hole) {
                regions.aperture.push((y, x));
            } else if in_aperture(distance, outer, inner) {
                regions.annulus.push((y, x));
            }
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_pixels(mask: &Array2<bool>) -> Vec<(usize, usize)> {
        mask.indexed_iter()
            .filter(|(_, &v)| v)
            .map(|(idx, _)| idx)
            .collect()
    }

    #[test]
    fn test_filled_disk_counts() {
        let mask = aperture_mask((30, 30), 15.0, 15.0, 3.0, 0.0);
        let count = mask.iter().filter(|&&v| v).count();

        // Aperture should have roughly pi * r^2 pixels
        let expected = (std::f64::consts::PI * 9.0) as usize;
        assert!(
            count >= expected - 5 && count <= expected + 5,
            "Aperture pixel count {count} should be near {expected}"
        );
        assert!(mask[[15, 15]]);
        assert!(!mask[[15, 18]], "outer radius is exclusive");
    }

    #[test]
    fn test_hole_is_inclusive() {
        let mask = aperture_mask((21, 21), 10.0, 10.0, 5.0, 2.0);
        assert!(!mask[[10, 10]]);
        assert!(!mask[[10, 11]]);
        assert!(mask[[10, 12]], "distance equal to hole is inside");
        assert!(mask[[10, 14]]);
        assert!(!mask[[10, 15]]);
    }

    #[test]
    fn test_degenerate_radius_is_empty() {
        let mask = aperture_mask((16, 16), 8.0, 8.0, 3.0, 3.0);
        assert!(mask.iter().all(|&v| !v));
        let mask = aperture_mask((16, 16), 8.0, 8.0, 2.0, 4.0);
        assert!(mask.iter().all(|&v| !v));
    }

    #[test]
    fn test_subpixel_center() {
        let mask = aperture_mask((20, 20), 10.5, 10.3, 1.0, 0.0);
        assert!(mask[[10, 10]]);
        assert!(mask[[10, 11]]);
        assert!(!mask[[12, 10]]);
    }

    #[test]
    fn test_inner_and_annulus_disjoint_and_cover_outer_disk() {
        let shape = (40, 40);
        let (cx, cy) = (19.3, 20.7);
        let (hole, inner, outer) = (2.0, 6.5, 11.0);

        let inner_mask = aperture_mask(shape, cx, cy, inner, hole);
        let annulus_mask = aperture_mask(shape, cx, cy, outer, inner);
        let hole_mask = aperture_mask(shape, cx, cy, hole, 0.0);
        let outer_disk = aperture_mask(shape, cx, cy, outer, 0.0);

        for ((&a, &b), (&h, &d)) in inner_mask
            .iter()
            .zip(annulus_mask.iter())
            .zip(hole_mask.iter().zip(outer_disk.iter()))
        {
            assert!(!(a && b), "aperture and annulus overlap");
            assert_eq!(a || b || h, d, "union must equal the outer disk");
        }
    }

    #[test]
    fn test_regions_match_masks() {
        let shape = (32, 48);
        let (cx, cy) = (20.0, 12.5);
        let regions = collect_aperture_regions(shape, cx, cy, 1.5, 4.0, 9.0);

        let mut aperture = regions.aperture.clone();
        let mut annulus = regions.annulus.clone();
        aperture.sort();
        annulus.sort();

        assert_eq!(aperture, mask_pixels(&aperture_mask(shape, cx, cy, 4.0, 1.5)));
        assert_eq!(annulus, mask_pixels(&aperture_mask(shape, cx, cy, 9.0, 4.0)));
    }

    #[test]
    fn test_regions_clip_at_edges() {
        let shape = (10, 10);
        let regions = collect_aperture_regions(shape, 1.0, 1.0, 0.0, 2.0, 4.5);

        assert!(!regions.aperture.is_empty());
        assert!(!regions.annulus.is_empty());
        assert!(regions
            .aperture
            .iter()
            .chain(regions.annulus.iter())
            .all(|&(y, x)| y < 10 && x < 10));
    }

    #[test]
    fn test_regions_outside_frame_are_empty() {
        let regions = collect_aperture_regions((10, 10), 50.0, -30.0, 0.0, 3.0, 6.0);
        assert_eq!(regions, ApertureRegions::default());
    }

    #[test]
    fn test_region_values() {
        let mut image = Array2::<f64>::zeros((20, 20));
        for ((y, x), v) in image.indexed_iter_mut() {
            let d = pixel_distance(x, y, 10.0, 10.0);
            *v = if d < 2.0 { 100.0 } else { 50.0 };
        }

        let regions = collect_aperture_regions((20, 20), 10.0, 10.0, 0.0, 2.0, 6.0);
        let (aperture, annulus) = regions.values(&image.view());

        assert!(aperture.iter().all(|&p| p == 100.0));
        assert!(annulus.iter().all(|&p| p == 50.0));
    }
}
