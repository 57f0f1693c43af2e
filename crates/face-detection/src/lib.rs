//! Face detection with a pixel-intensity cascade classifier
//!
//! A cascade model is a sequence of stages, each a small forest of binary
//! decision trees whose nodes compare the intensities of two pixels inside a
//! square window. Windows are swept over the image at every scale, rejected as
//! soon as a stage total falls below its threshold, and the survivors are
//! merged by overlap before being drawn onto a copy of the image.
//!
//! # Features
//! - Compact big-endian cascade model format, decoded with full bounds checks
//! - Parallel multi-scale window evaluation via `rayon`
//! - IoU clustering of overlapping detections
//! - Rectangle or circle markers, re-encoded as JPEG
//!
//! # Example
//! ```no_run
//! use cascade_faces_detection::{FaceDetectionConfig, FaceDetector};
//!
//! # fn main() -> anyhow::Result<()> {
//! let detector = FaceDetector::from_file("facefinder", FaceDetectionConfig::default())?;
//!
//! let bytes = std::fs::read("group.jpg")?;
//! let result = detector.process("group.jpg", &bytes)?;
//!
//! for face in &result.faces {
//!     println!("Face at ({}, {}) edge {}", face.x, face.y, face.width);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod classifier;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod error;
pub mod pixels;
pub mod render;

pub use cascade::{CascadeModel, SplitNode, Stage, Tree};
pub use classifier::Detection;
pub use cluster::cluster;
pub use config::{CascadeParameters, FaceDetectionConfig, MarkerShape};
pub use error::FaceDetectionError;
pub use pixels::PixelBuffer;
pub use render::Annotator;

use cascade_faces_common::DetectionResult;
use image::DynamicImage;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cascade face detector
///
/// Holds one decoded model and a validated configuration. The model is
/// shared read-only, so a single detector can serve many threads.
#[derive(Debug, Clone)]
pub struct FaceDetector {
    model: Arc<CascadeModel>,
    config: FaceDetectionConfig,
    annotator: Annotator,
}

impl FaceDetector {
    /// Create a detector, rejecting invalid configuration
    pub fn new(
        model: CascadeModel,
        config: FaceDetectionConfig,
    ) -> Result<Self, FaceDetectionError> {
        config.validate()?;
        info!(
            "Face detector ready: {} stages, {} trees, marker {:?}",
            model.stage_count(),
            model.tree_count(),
            config.marker
        );
        Ok(Self {
            model: Arc::new(model),
            annotator: Annotator::new(config.marker),
            config,
        })
    }

    /// Decode a model blob and create a detector
    pub fn from_bytes(
        data: &[u8],
        config: FaceDetectionConfig,
    ) -> Result<Self, FaceDetectionError> {
        Self::new(CascadeModel::from_bytes(data)?, config)
    }

    /// Load the model file from disk and create a detector
    pub fn from_file<P: AsRef<Path>>(
        model_path: P,
        config: FaceDetectionConfig,
    ) -> Result<Self, FaceDetectionError> {
        Self::new(CascadeModel::from_file(model_path)?, config)
    }

    #[must_use]
    pub fn model(&self) -> &CascadeModel {
        &self.model
    }

    #[must_use]
    pub fn config(&self) -> &FaceDetectionConfig {
        &self.config
    }

    /// Clustered detections for a grayscale buffer, best first
    pub fn detect_pixels(
        &self,
        pixels: &PixelBuffer,
    ) -> Result<Vec<Detection>, FaceDetectionError> {
        let params = &self.config.cascade;
        let raw = if self.config.parallel {
            classifier::detect(pixels, &self.model, params)?
        } else {
            classifier::detect_sequential(pixels, &self.model, params)?
        };
        Ok(cluster::cluster(&raw, params.iou_threshold))
    }

    /// Clustered detections for a decoded image
    pub fn detect_image(&self, image: &DynamicImage) -> Result<Vec<Detection>, FaceDetectionError> {
        self.detect_pixels(&PixelBuffer::from_image(image))
    }

    /// Run the full pipeline on one encoded image
    pub fn process(&self, name: &str, bytes: &[u8]) -> Result<DetectionResult, FaceDetectionError> {
        let start = Instant::now();

        let image = codec::decode(name, bytes)?;
        let clusters = self.detect_image(&image)?;
        let annotation = self.annotator.annotate(name, &image.to_rgb8(), &clusters)?;

        debug!(
            "{}: {}x{}, {} faces in {:.1}ms",
            name,
            image.width(),
            image.height(),
            annotation.faces.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(DetectionResult {
            faces: annotation.faces,
            image: annotation.jpeg,
            image_name: name.to_string(),
        })
    }

    /// Process named images in parallel.
    ///
    /// Each entry succeeds or fails on its own; results are in input order.
    pub fn process_batch(
        &self,
        images: &[(String, Vec<u8>)],
    ) -> Vec<Result<DetectionResult, FaceDetectionError>> {
        let start = Instant::now();

        let results: Vec<_> = images
            .par_iter()
            .map(|(name, bytes)| {
                self.process(name, bytes).inspect_err(|e| {
                    warn!("Face detection failed for {}: {}", name, e);
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            "Processed {} images ({} failed) in {:.2}s",
            images.len(),
            failed,
            start.elapsed().as_secs_f64()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump_model() -> CascadeModel {
        let tree = Tree::new(0, vec![], vec![1.0]).unwrap();
        CascadeModel::new(vec![Stage::new(vec![tree], 0.0).unwrap()]).unwrap()
    }

    #[test]
    fn test_detector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FaceDetector>();
        assert_send_sync::<CascadeModel>();
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = FaceDetectionConfig::default();
        config.cascade.scale_factor = 0.9;
        assert!(matches!(
            FaceDetector::new(stump_model(), config),
            Err(FaceDetectionError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_truncated_model() {
        let bytes = stump_model().to_bytes();
        let truncated = &bytes[..bytes.len() - 1];
        let err = FaceDetector::from_bytes(truncated, FaceDetectionConfig::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_clones_share_model() {
        let detector = FaceDetector::new(stump_model(), FaceDetectionConfig::default()).unwrap();
        let clone = detector.clone();
        assert!(Arc::ptr_eq(&detector.model, &clone.model));
    }
}
