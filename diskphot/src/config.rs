//! JSON observation configuration.
//!
//! Holds everything about an observation that is chosen by hand rather
//! than measured: target positions, filter reduction factors and the
//! default measurement settings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_proc::background::DEFAULT_CLIP_SIGMA;
use crate::image_proc::overlay::DEFAULT_OVERLAY_ALPHA;
use crate::image_proc::photometry::PerturbationGrid;
use crate::observation::Observation;
use crate::target::Target;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default grid and background settings for photometry calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryDefaults {
    pub displacement_range: usize,
    pub scale_range: usize,
    pub clip_sigma: f64,
}

impl Default for PhotometryDefaults {
    fn default() -> Self {
        Self {
            displacement_range: 1,
            scale_range: 1,
            clip_sigma: DEFAULT_CLIP_SIGMA,
        }
    }
}

impl PhotometryDefaults {
    pub fn grid(&self) -> PerturbationGrid {
        PerturbationGrid::new(self.displacement_range, self.scale_range)
    }
}

fn default_filter_reduction() -> [f64; 2] {
    [1.0, 1.0]
}

fn default_overlay_alpha() -> f64 {
    DEFAULT_OVERLAY_ALPHA
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub name: String,
    #[serde(default)]
    pub disk: Option<Target>,
    #[serde(default)]
    pub objects: Vec<Target>,
    #[serde(default = "default_filter_reduction")]
    pub filter_reduction: [f64; 2],
    #[serde(default)]
    pub photometry: PhotometryDefaults,
    #[serde(default = "default_overlay_alpha")]
    pub overlay_alpha: f64,
}

impl ObservationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disk: None,
            objects: Vec::new(),
            filter_reduction: default_filter_reduction(),
            photometry: PhotometryDefaults::default(),
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
        }
    }

    /// Capture the hand-chosen settings of an existing observation.
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            disk: observation.disk().cloned(),
            objects: observation.objects().to_vec(),
            filter_reduction: observation.filter_reduction(),
            ..Self::new(observation.name())
        }
    }

    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Set targets and filter reduction on `observation`, replacing its
    /// object list. The observation keeps its own name.
    pub fn apply(&self, observation: &mut Observation) {
        if self.name != observation.name() {
            log::warn!(
                "config for {:?} applied to observation {:?}",
                self.name,
                observation.name()
            );
        }
        if let Some(disk) = &self.disk {
            observation.set_disk(disk.clone());
        }
        observation.clear_objects();
        for object in &self.objects {
            observation.add_object(object.clone());
        }
        observation.set_filter_reduction(self.filter_reduction);
    }

    pub fn grid(&self) -> PerturbationGrid {
        self.photometry.grid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::synthetic_observation;

    #[test]
    fn test_round_trip() {
        let mut config = ObservationConfig::new("HD 0000");
        config.disk = Some(Target::new("disk", 512, 512));
        config.objects.push(Target::new("Companion", 600, 431));
        config.filter_reduction = [1.0, 0.8371];
        config.photometry.scale_range = 2;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observation.json");
        config.save_to_file(&path).unwrap();

        assert_eq!(ObservationConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: ObservationConfig = serde_json::from_str(r#"{"name": "bare"}"#).unwrap();

        assert_eq!(config, ObservationConfig::new("bare"));
        assert_eq!(config.grid(), PerturbationGrid::new(1, 1));
        assert_eq!(config.photometry.clip_sigma, 4.0);
        assert_eq!(config.overlay_alpha, 0.125);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ObservationConfig::load_from_file(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_replaces_targets() {
        let mut obs = synthetic_observation(32, 0);
        let mut config = ObservationConfig::new(obs.name());
        config.disk = Some(Target::new("disk", 15, 17));
        config.objects.push(Target::new("only", 8, 8));
        config.filter_reduction = [2.0, 3.0];

        config.apply(&mut obs);

        assert_eq!(obs.disk().map(Target::pos), Some((15, 17)));
        assert_eq!(obs.objects(), &[Target::new("only", 8, 8)]);
        assert_eq!(obs.filter_reduction(), [2.0, 3.0]);
        assert_eq!(ObservationConfig::from_observation(&obs), config);
    }
}
