//! Binary persistence for derived products and frame bundles.
//!
//! Both bundles are serde-encoded with bincode's standard configuration.
//! Floats are written as raw IEEE-754 bits, so NaN pixels and every other
//! value survive a save/load cycle bit for bit.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::band::{Band, BandStack};
use crate::image_proc::azimuthal::AzimuthalProfile;
use crate::image_proc::stokes::RadialPolarization;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("stored data does not fit: {0}")]
    ShapeMismatch(String),
}

/// Number of raw-intensity profiles: planes 0 and 2 of each band.
pub const RAW_PROFILE_COUNT: usize = 4;

/// Everything computed once per observation and reused afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedProducts {
    /// Q_phi / U_phi per band, in [`Band::ALL`] order
    pub radial: Vec<RadialPolarization>,
    /// Band I plane 0, band I plane 2, band R plane 0, band R plane 2
    pub azimuthal: Vec<AzimuthalProfile>,
    /// Q_phi profile per band
    pub azimuthal_qphi: Vec<AzimuthalProfile>,
}

impl DerivedProducts {
    /// Check entry counts and that every image and profile belongs to a
    /// frame of `shape`.
    pub fn validate_for(&self, shape: (usize, usize)) -> Result<(), PersistError> {
        self.validate_layout()?;

        for (band, radial) in Band::ALL.iter().zip(&self.radial) {
            if radial.q_phi.dim() != shape || radial.u_phi.dim() != shape {
                return Err(PersistError::ShapeMismatch(format!(
                    "{band} radial images are {:?}, frames are {shape:?}",
                    radial.q_phi.dim()
                )));
            }
        }

        let bins = shape.0.min(shape.1) / 2;
        if let Some(bad) = self
            .azimuthal
            .iter()
            .chain(&self.azimuthal_qphi)
            .find(|p| p.len() != bins)
        {
            return Err(PersistError::ShapeMismatch(format!(
                "profile has {} bins, frames give {bins}",
                bad.len()
            )));
        }
        Ok(())
    }

    fn validate_layout(&self) -> Result<(), PersistError> {
        let counts = [
            ("radial images", self.radial.len(), Band::ALL.len()),
            ("raw profiles", self.azimuthal.len(), RAW_PROFILE_COUNT),
            ("Q_phi profiles", self.azimuthal_qphi.len(), Band::ALL.len()),
        ];
        for (what, found, expected) in counts {
            if found != expected {
                return Err(PersistError::ShapeMismatch(format!(
                    "expected {expected} {what}, found {found}"
                )));
            }
        }
        Ok(())
    }
}

/// Named set of band stacks, one per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameBundle {
    pub name: String,
    pub bands: Vec<BandStack>,
}

impl FrameBundle {
    fn validate(&self) -> Result<(), PersistError> {
        if self.bands.len() != Band::ALL.len() {
            return Err(PersistError::ShapeMismatch(format!(
                "expected {} band stacks, found {}",
                Band::ALL.len(),
                self.bands.len()
            )));
        }
        for stack in &self.bands {
            stack
                .validate()
                .map_err(|e| PersistError::ShapeMismatch(e.to_string()))?;
        }
        Ok(())
    }
}

fn write_bincode<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let written =
        bincode::serde::encode_into_std_write(value, &mut writer, bincode::config::standard())?;
    writer.flush()?;
    log::debug!("wrote {written} bytes to {}", path.display());
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let mut reader = BufReader::new(File::open(path)?);
    Ok(bincode::serde::decode_from_std_read(
        &mut reader,
        bincode::config::standard(),
    )?)
}

/// Save derived products to `path`, replacing any existing file.
pub fn save_derived(products: &DerivedProducts, path: &Path) -> Result<(), PersistError> {
    products.validate_layout()?;
    write_bincode(products, path)?;
    log::info!("saved derived products to {}", path.display());
    Ok(())
}

/// Load derived products written by [`save_derived`].
pub fn load_derived(path: &Path) -> Result<DerivedProducts, PersistError> {
    let products: DerivedProducts = read_bincode(path)?;
    products.validate_layout()?;
    log::info!("loaded derived products from {}", path.display());
    Ok(products)
}

pub fn save_frames(bundle: &FrameBundle, path: &Path) -> Result<(), PersistError> {
    bundle.validate()?;
    write_bincode(bundle, path)?;
    log::info!("saved frames of {} to {}", bundle.name, path.display());
    Ok(())
}

pub fn load_frames(path: &Path) -> Result<FrameBundle, PersistError> {
    let bundle: FrameBundle = read_bincode(path)?;
    bundle.validate()?;
    log::info!("loaded frames of {} from {}", bundle.name, path.display());
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn products(size: usize) -> DerivedProducts {
        let image = Array2::from_shape_fn((size, size), |(y, x)| {
            if x == y {
                f64::NAN
            } else {
                (x as f64 - y as f64) / 3.0
            }
        });
        let radial = RadialPolarization {
            q_phi: image.clone(),
            u_phi: -image,
        };
        let profile = AzimuthalProfile {
            radius: (0..size / 2).collect(),
            mean: (0..size / 2).map(|r| 1.0 / (r as f64 + 1.0)).collect(),
            std: vec![f64::NAN; size / 2],
        };
        DerivedProducts {
            radial: vec![radial.clone(), radial],
            azimuthal: vec![profile.clone(); 4],
            azimuthal_qphi: vec![profile; 2],
        }
    }

    #[test]
    fn test_derived_round_trip_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived.bin");
        let saved = products(12);

        save_derived(&saved, &path).unwrap();
        let loaded = load_derived(&path).unwrap();

        let bits = |p: &DerivedProducts| -> Vec<u64> {
            p.radial
                .iter()
                .flat_map(|r| r.q_phi.iter().chain(r.u_phi.iter()))
                .chain(p.azimuthal.iter().flat_map(|a| a.mean.iter().chain(&a.std)))
                .map(|v| v.to_bits())
                .collect()
        };
        assert_eq!(bits(&saved), bits(&loaded));
        assert_eq!(saved.azimuthal[0].radius, loaded.azimuthal[0].radius);
        assert!(loaded.validate_for((12, 12)).is_ok());
    }

    #[test]
    fn test_validate_for_rejects_other_frame_size() {
        let derived = products(12);
        assert!(matches!(
            derived.validate_for((16, 16)),
            Err(PersistError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_incomplete_products_not_saved() {
        let mut derived = products(8);
        derived.azimuthal.pop();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived.bin");

        assert!(matches!(
            save_derived(&derived, &path),
            Err(PersistError::ShapeMismatch(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_derived(&dir.path().join("absent.bin"));
        assert!(matches!(result, Err(PersistError::Io(_))));
    }

    #[test]
    fn test_garbage_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, [0xff_u8; 3]).unwrap();
        assert!(load_frames(&path).is_err());
    }

    #[test]
    fn test_frames_round_trip() {
        let planes = |offset: f64| {
            [0.0, 1.0, 2.0, 3.0].map(|p| Array2::from_elem((6, 5), p + offset))
        };
        let bundle = FrameBundle {
            name: "HD 0000".to_string(),
            bands: vec![
                BandStack::from_planes(Band::I, planes(0.0)).unwrap(),
                BandStack::from_planes(Band::R, planes(10.0)).unwrap(),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.bin");
        save_frames(&bundle, &path).unwrap();

        assert_eq!(load_frames(&path).unwrap(), bundle);
    }
}
