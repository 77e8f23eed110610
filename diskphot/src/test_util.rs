//! Deterministic synthetic frames for tests and demos.
//!
//! Frames are built from simple analytic shapes (Gaussian stars, a
//! tangentially polarized ring) on a flat sky with seeded Gaussian noise,
//! so every call with the same arguments returns bit-identical data.

use ndarray::Array2;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Normal, NormalError};

use crate::band::{Band, BandStack};
use crate::image_proc::aperture::pixel_distance;
use crate::image_proc::stokes::{angle_phi, image_center};
use crate::observation::Observation;
use crate::target::Target;

/// Sky level of synthetic frames.
pub const SKY_LEVEL: f64 = 10.0;
/// Per-pixel noise of synthetic intensity frames.
pub const NOISE_SIGMA: f64 = 0.5;

/// Array of Normal(mean, std_dev) samples from a seeded generator.
pub fn simple_normal_array(
    size: (usize, usize),
    mean: f64,
    std_dev: f64,
    seed: u64,
) -> Result<Array2<f64>, NormalError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal_dist = Normal::new(mean, std_dev)?;
    Ok(Array2::from_shape_fn(size, |_| normal_dist.sample(&mut rng)))
}

/// Stack whose four planes are all `value`.
pub fn constant_stack(band: Band, shape: (usize, usize), value: f64) -> BandStack {
    let plane = Array2::from_elem(shape, value);
    BandStack::from_planes(band, [plane.clone(), plane.clone(), plane.clone(), plane])
        .expect("four planes of one shape always stack")
}

/// Circular Gaussian of total flux `flux` centered on `(cx, cy)`.
pub fn gaussian_star(shape: (usize, usize), cx: f64, cy: f64, sigma: f64, flux: f64) -> Array2<f64> {
    let norm = flux / (2.0 * std::f64::consts::PI * sigma * sigma);
    Array2::from_shape_fn(shape, |(y, x)| {
        let d = pixel_distance(x, y, cx, cy);
        norm * (-0.5 * d * d / (sigma * sigma)).exp()
    })
}

/// Q and U planes of light polarized tangentially around `center` with
/// polarized intensity `amplitude`: `Q = −P·cos 2φ`, `U = P·sin 2φ`.
///
/// The radial decomposition maps this back to `Q_phi = P`, `U_phi = 0`.
pub fn tangential_polarization(
    amplitude: &Array2<f64>,
    center: (usize, usize),
) -> (Array2<f64>, Array2<f64>) {
    let phi = angle_phi(amplitude.dim(), center.0, center.1);
    let q = ndarray::Zip::from(amplitude)
        .and(&phi)
        .map_collect(|&p, &phi| -p * (2.0 * phi).cos());
    let u = ndarray::Zip::from(amplitude)
        .and(&phi)
        .map_collect(|&p, &phi| p * (2.0 * phi).sin());
    (q, u)
}

/// Gaussian ring profile of polarized intensity.
pub fn ring_amplitude(
    shape: (usize, usize),
    center: (usize, usize),
    radius: f64,
    width: f64,
    peak: f64,
) -> Array2<f64> {
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    Array2::from_shape_fn(shape, |(y, x)| {
        let t = (pixel_distance(x, y, cx, cy) - radius) / width;
        peak * (-t * t).exp()
    })
}

/// Square observation of a star with a polarized ring and two companions.
///
/// The disk target sits at the frame center, the objects `"Companion A"`
/// and `"Companion B"` at a quarter of the frame from the top-left and
/// top-right corners. Band R is fainter than band I. `size` should be at
/// least 32.
pub fn synthetic_observation(size: usize, seed: u64) -> Observation {
    let shape = (size, size);
    let center = image_center(shape);
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    let companions = [
        Target::new("Companion A", size / 4, size / 4),
        Target::new("Companion B", 3 * size / 4, size / 4),
    ];

    let stack = |band: Band, scale: f64, seed: u64| -> BandStack {
        let polarized = ring_amplitude(shape, center, size as f64 / 6.0, 2.0, 40.0 * scale);
        let (q, u) = tangential_polarization(&polarized, center);

        let mut scene = gaussian_star(shape, cx, cy, 1.5, 5000.0 * scale) + &polarized;
        for (index, companion) in companions.iter().enumerate() {
            let (x, y) = companion.center();
            scene += &gaussian_star(shape, x, y, 1.2, (800.0 + 400.0 * index as f64) * scale);
        }

        let noise = |offset: u64| {
            simple_normal_array(shape, SKY_LEVEL, NOISE_SIGMA, seed + offset)
                .expect("NOISE_SIGMA is finite")
        };
        let intensity = &scene + &noise(0);
        let secondary = &scene * 0.5 + &noise(1);

        BandStack::from_planes(band, [intensity, q, secondary, u])
            .expect("all planes share the frame shape")
    };

    let i_band = stack(Band::I, 1.0, seed);
    let r_band = stack(Band::R, 0.7, seed.wrapping_add(1000));

    let mut observation = Observation::new(format!("synthetic-{seed}"), i_band, r_band)
        .expect("I and R stacks are built with one shape");
    observation.set_disk(Target::new("disk", center.0, center.1));
    for companion in companions {
        observation.add_object(companion);
    }
    observation
}
