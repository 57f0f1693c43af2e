//! Detector configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FaceDetectionError;

/// Sliding-window and clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeParameters {
    /// Smallest window edge in pixels
    pub min_size: u32,
    /// Largest window edge in pixels
    pub max_size: u32,
    /// Grid step as a fraction of the window edge (0.1 = 10%)
    pub shift_factor: f64,
    /// Window growth per scale step
    pub scale_factor: f64,
    /// Detections overlapping a cluster seed by more than this are merged
    pub iou_threshold: f64,
}

impl Default for CascadeParameters {
    fn default() -> Self {
        Self {
            min_size: 20,
            max_size: 2000,
            shift_factor: 0.1,
            scale_factor: 1.1,
            iou_threshold: 0.18,
        }
    }
}

impl CascadeParameters {
    /// Reject non-physical configurations
    pub fn validate(&self) -> Result<(), FaceDetectionError> {
        if self.min_size == 0 {
            return Err(FaceDetectionError::InvalidParameters(
                "min_size must be > 0".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(FaceDetectionError::InvalidParameters(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if !(self.shift_factor > 0.0 && self.shift_factor <= 1.0) {
            return Err(FaceDetectionError::InvalidParameters(format!(
                "shift_factor must be in (0, 1], got {}",
                self.shift_factor
            )));
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(FaceDetectionError::InvalidParameters(format!(
                "scale_factor must be > 1, got {}",
                self.scale_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(FaceDetectionError::InvalidParameters(format!(
                "iou_threshold must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        Ok(())
    }
}

/// Outline drawn around each face
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    #[default]
    Rectangle,
    Circle,
}

/// Full detector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    pub cascade: CascadeParameters,
    pub marker: MarkerShape,
    /// Evaluate window scales on the rayon pool
    pub parallel: bool,
}

impl FaceDetectionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml(yaml_path: impl AsRef<Path>) -> Result<Self, FaceDetectionError> {
        let contents = std::fs::read_to_string(yaml_path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, FaceDetectionError> {
        let config: Self = serde_yaml::from_str(contents).map_err(|e| {
            FaceDetectionError::InvalidParameters(format!("Failed to parse YAML: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FaceDetectionError> {
        self.cascade.validate()
    }
}
