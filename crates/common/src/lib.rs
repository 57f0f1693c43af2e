/// Common types shared by the detection core and its front ends
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upload limit, 32 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 32 << 20;

/// Input rejection errors, raised before an image reaches the detector
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Unsupported format for {name}: {reason}")]
    UnsupportedFormat { name: String, reason: String },

    #[error("File too large: {name} is {size} bytes (max: {max})")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check a named image payload before handing it to the detector.
///
/// Rejects empty payloads, payloads over `max_bytes`, and byte streams whose
/// magic bytes do not match a known image format.
pub fn check_payload(name: &str, data: &[u8], max_bytes: u64) -> Result<(), ProcessingError> {
    if data.is_empty() {
        return Err(ProcessingError::EmptyInput(name.to_string()));
    }

    let size = data.len() as u64;
    if size > max_bytes {
        return Err(ProcessingError::FileTooLarge {
            name: name.to_string(),
            size,
            max: max_bytes,
        });
    }

    image::guess_format(data).map_err(|e| ProcessingError::UnsupportedFormat {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Axis-aligned face rectangle in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rectangle {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Edge length of the detection window
    pub width: i32,
    /// Edge length of the detection window
    pub height: i32,
}

impl Rectangle {
    /// Square of edge `size` centered on `(col, row)`
    #[must_use]
    pub fn centered(row: i32, col: i32, size: i32) -> Self {
        Self {
            x: col - size / 2,
            y: row - size / 2,
            width: size,
            height: size,
        }
    }

    #[must_use]
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[must_use]
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Per-image output record.
///
/// Field names follow the wire format existing clients expect:
/// `Faces`, `ImageBase64` and `ImageName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(rename = "Faces")]
    pub faces: Vec<Rectangle>,

    /// Annotated JPEG bytes, base64 encoded on the wire
    #[serde(rename = "ImageBase64", with = "base64_bytes")]
    pub image: Vec<u8>,

    #[serde(rename = "ImageName")]
    pub image_name: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
