//! Error types for the detection pipeline

use cascade_faces_common::ProcessingError;
use thiserror::Error;

/// Errors that can occur while loading a model or processing an image
#[derive(Error, Debug)]
pub enum FaceDetectionError {
    /// Fewer bytes than the model header declares
    #[error("Cascade model truncated at byte {offset} while reading {context}")]
    TruncatedInput { offset: usize, context: String },

    /// Byte content inconsistent with the declared layout
    #[error("Malformed cascade model: {0}")]
    MalformedModel(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to decode image {image}: {reason}")]
    DecodeFailure { image: String, reason: String },

    #[error("Failed to encode image {image}: {reason}")]
    EncodeFailure { image: String, reason: String },

    #[error("Input rejected: {0}")]
    Rejected(#[from] ProcessingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FaceDetectionError {
    /// Model and configuration errors make the detector unusable; everything
    /// else is scoped to a single image.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FaceDetectionError::TruncatedInput { .. }
                | FaceDetectionError::MalformedModel(_)
                | FaceDetectionError::InvalidParameters(_)
        )
    }
}
