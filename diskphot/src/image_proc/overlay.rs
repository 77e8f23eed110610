//! RGBA overlays marking apertures and background annuli.
//!
//! Each marked region adds to a per-pixel level (0.5 for an aperture, 1.0
//! for an annulus) and to an alpha channel. The level is colored through the
//! nine-entry reversed "Set1" qualitative palette, so apertures render
//! orange, annuli red and untouched pixels fully transparent grey.

use std::path::Path;

use image::{ImageBuffer, Rgba};
use ndarray::{Array2, Array3, Zip};

/// Default opacity added per marked region.
pub const DEFAULT_OVERLAY_ALPHA: f64 = 0.125;

/// Level contributed by an aperture pixel.
const APERTURE_LEVEL: f64 = 0.5;
/// Level contributed by an annulus pixel.
const ANNULUS_LEVEL: f64 = 1.0;

/// Reversed Set1 palette, RGB in `[0, 1]`.
pub const SET1_R: [[f64; 3]; 9] = [
    [0.6, 0.6, 0.6],
    [0.968_627_450_980_392_2, 0.505_882_352_941_176_5, 0.749_019_607_843_137_3],
    [0.650_980_392_156_862_7, 0.337_254_901_960_784_3, 0.156_862_745_098_039_2],
    [1.0, 1.0, 0.2],
    [1.0, 0.498_039_215_686_274_5, 0.0],
    [0.596_078_431_372_549, 0.305_882_352_941_176_5, 0.639_215_686_274_509_8],
    [0.301_960_784_313_725_5, 0.686_274_509_803_921_6, 0.290_196_078_431_372_5],
    [0.215_686_274_509_803_9, 0.494_117_647_058_823_5, 0.721_568_627_450_980_4],
    [0.894_117_647_058_823_5, 0.101_960_784_313_725_49, 0.109_803_921_568_627_45],
];

/// Map a level in `[0, 1]` to an RGBA color.
///
/// Values below 0 take the first entry, values at or above 1 the last, and
/// NaN maps to transparent black.
pub fn colormap_set1_r(level: f64) -> [f64; 4] {
    if level.is_nan() {
        return [0.0; 4];
    }
    let n = SET1_R.len();
    let index = if level < 0.0 {
        0
    } else {
        ((level * n as f64) as usize).min(n - 1)
    };
    let [r, g, b] = SET1_R[index];
    [r, g, b, 1.0]
}

/// Accumulates marked regions into a single overlay.
#[derive(Debug, Clone)]
pub struct OverlayBuilder {
    level: Array2<f64>,
    alpha: Array2<f64>,
    alpha_step: f64,
}

impl OverlayBuilder {
    pub fn new(shape: (usize, usize), alpha_step: f64) -> Self {
        Self {
            level: Array2::zeros(shape),
            alpha: Array2::zeros(shape),
            alpha_step,
        }
    }

    /// Add one aperture mask and its annulus mask.
    ///
    /// Both masks must have the builder's shape.
    pub fn add_regions(&mut self, aperture: &Array2<bool>, annulus: &Array2<bool>) {
        let step = self.alpha_step;
        Zip::from(&mut self.level)
            .and(&mut self.alpha)
            .and(aperture)
            .and(annulus)
            .for_each(|level, alpha, &inside, &ring| {
                let (a, r) = (inside as u8 as f64, ring as u8 as f64);
                *level += APERTURE_LEVEL * a + ANNULUS_LEVEL * r;
                *alpha += step * (a + r);
            });
    }

    /// Accumulated level before coloring.
    pub fn level(&self) -> &Array2<f64> {
        &self.level
    }

    /// Color the accumulated levels; result is `(rows, cols, 4)` RGBA.
    pub fn finish(self) -> Array3<f64> {
        let (rows, cols) = self.level.dim();
        Array3::from_shape_fn((rows, cols, 4), |(y, x, c)| {
            if c == 3 {
                self.alpha[[y, x]]
            } else {
                colormap_set1_r(self.level[[y, x]])[c]
            }
        })
    }
}

/// Write an RGBA overlay as an 8-bit PNG. Channel values are clamped to `[0, 1]`.
pub fn save_overlay_png<P: AsRef<Path>>(overlay: &Array3<f64>, path: P) -> image::ImageResult<()> {
    let (height, width, _) = overlay.dim();

    let mut img_buffer = ImageBuffer::new(width as u32, height as u32);
    for (x, y, pixel) in img_buffer.enumerate_pixels_mut() {
        let channel = |c: usize| {
            let v = overlay[[y as usize, x as usize, c]];
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        };
        *pixel = Rgba([channel(0), channel(1), channel(2), channel(3)]);
    }

    img_buffer.save(path)
}
