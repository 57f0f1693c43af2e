//! Single-channel intensity buffer fed to the classifier

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::FaceDetectionError;

/// Row-major 8-bit grayscale pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw intensities; `data.len()` must equal `width * height`
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FaceDetectionError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FaceDetectionError::InvalidParameters(format!(
                "pixel buffer of {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniform buffer, mostly useful for tests
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Luma conversion with BT.601 weights (0.299, 0.587, 0.114), truncated
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)) as u8
            })
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
        }
    }

    /// Grayscale inputs are taken as-is, everything else goes through RGB
    #[must_use]
    pub fn from_image(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::from_gray(gray),
            other => Self::from_rgb(&other.to_rgb8()),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Intensity at `(row, col)`, clamped to the nearest valid pixel
    #[inline]
    #[must_use]
    pub fn clamped(&self, row: i32, col: i32) -> u8 {
        let r = row.clamp(0, self.height as i32 - 1) as usize;
        let c = col.clamp(0, self.width as i32 - 1) as usize;
        self.data[r * self.width as usize + c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    #[test]
    fn test_new_checks_length() {
        assert!(PixelBuffer::new(3, 2, vec![0; 6]).is_ok());
        assert!(matches!(
            PixelBuffer::new(3, 2, vec![0; 5]),
            Err(FaceDetectionError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_rgb_conversion_weights() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([0, 0, 255]));

        let buffer = PixelBuffer::from_rgb(&img);
        assert_eq!(buffer.as_raw(), &[76, 149, 29]);
    }

    #[test]
    fn test_gray_image_passthrough() {
        let gray = GrayImage::from_fn(4, 2, |x, y| Luma([(x + 10 * y) as u8]));
        let buffer = PixelBuffer::from_image(&DynamicImage::ImageLuma8(gray));
        assert_eq!(buffer.width(), 4);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.as_raw(), &[0, 1, 2, 3, 10, 11, 12, 13]);
    }

    #[test]
    fn test_clamped_access() {
        let buffer = PixelBuffer::new(2, 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.clamped(0, 1), 2);
        assert_eq!(buffer.clamped(-5, -5), 1);
        assert_eq!(buffer.clamped(9, 0), 3);
        assert_eq!(buffer.clamped(9, 9), 4);
    }
}
