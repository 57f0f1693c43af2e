//! Image decode/encode through the `image` crate

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageEncoder, RgbImage};

use crate::error::FaceDetectionError;

/// Decode JPEG or PNG bytes. `name` only labels errors.
pub fn decode(name: &str, bytes: &[u8]) -> Result<DynamicImage, FaceDetectionError> {
    let image = image::load_from_memory(bytes).map_err(|e| FaceDetectionError::DecodeFailure {
        image: name.to_string(),
        reason: e.to_string(),
    })?;

    if image.width() == 0 || image.height() == 0 {
        return Err(FaceDetectionError::DecodeFailure {
            image: name.to_string(),
            reason: "image dimensions are zero".to_string(),
        });
    }
    Ok(image)
}

/// Encode an RGB image as baseline JPEG at `quality` (1-100)
pub fn encode_jpeg(
    name: &str,
    image: &RgbImage,
    quality: u8,
) -> Result<Vec<u8>, FaceDetectionError> {
    if !(1..=100).contains(&quality) {
        return Err(FaceDetectionError::InvalidParameters(format!(
            "JPEG quality must be in 1..=100, got {quality}"
        )));
    }

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| FaceDetectionError::EncodeFailure {
            image: name.to_string(),
            reason: e.to_string(),
        })?;

    Ok(buffer)
}
