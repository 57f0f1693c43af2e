//! Face markers drawn onto a copy of the source image

use cascade_faces_common::Rectangle;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::classifier::Detection;
use crate::codec;
use crate::config::MarkerShape;
use crate::error::FaceDetectionError;

/// Only clusters scoring above this are drawn and reported
pub const QUALITY_THRESHOLD: f32 = 5.0;

/// Outline thickness in pixels
pub const STROKE_WIDTH: i32 = 2;

pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

pub const JPEG_QUALITY: u8 = 100;

/// Marked-up copy of an image plus the faces drawn on it
#[derive(Debug, Clone)]
pub struct Drawing {
    pub canvas: RgbImage,
    pub faces: Vec<Rectangle>,
}

/// Marked-up image already encoded as JPEG
#[derive(Debug, Clone)]
pub struct Annotation {
    pub jpeg: Vec<u8>,
    pub faces: Vec<Rectangle>,
}

/// Draws one outline per accepted cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct Annotator {
    shape: MarkerShape,
}

impl Annotator {
    #[must_use]
    pub fn new(shape: MarkerShape) -> Self {
        Self { shape }
    }

    #[must_use]
    pub fn shape(&self) -> MarkerShape {
        self.shape
    }

    /// Draw every cluster with `score > QUALITY_THRESHOLD` onto a copy of
    /// `source`. The source image is left untouched.
    #[must_use]
    pub fn draw(&self, source: &RgbImage, clusters: &[Detection]) -> Drawing {
        let mut canvas = source.clone();
        let mut faces = Vec::new();

        for det in clusters.iter().filter(|d| d.score > QUALITY_THRESHOLD) {
            let window = det.window();
            match self.shape {
                MarkerShape::Rectangle => stroke_rect(&mut canvas, &window),
                MarkerShape::Circle => {
                    stroke_circle(&mut canvas, (det.col, det.row), det.scale / 2);
                }
            }
            faces.push(window);
        }

        debug!(
            "Drew {} of {} clusters ({:?} markers)",
            faces.len(),
            clusters.len(),
            self.shape
        );
        Drawing { canvas, faces }
    }

    /// [`draw`](Self::draw), then encode the canvas as JPEG
    pub fn annotate(
        &self,
        name: &str,
        source: &RgbImage,
        clusters: &[Detection],
    ) -> Result<Annotation, FaceDetectionError> {
        let Drawing { canvas, faces } = self.draw(source, clusters);
        let jpeg = codec::encode_jpeg(name, &canvas, JPEG_QUALITY)?;
        Ok(Annotation { jpeg, faces })
    }
}

/// Outline offsets straddling the marker path, one per stroke pixel
fn stroke_offsets() -> impl Iterator<Item = i32> {
    let start = -(STROKE_WIDTH / 2);
    start..start + STROKE_WIDTH
}

fn stroke_rect(canvas: &mut RgbImage, window: &Rectangle) {
    for offset in stroke_offsets() {
        let width = window.width - 2 * offset;
        let height = window.height - 2 * offset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(window.x + offset, window.y + offset)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, MARKER_COLOR);
    }
}

fn stroke_circle(canvas: &mut RgbImage, center: (i32, i32), radius: i32) {
    for offset in stroke_offsets() {
        let r = radius - offset;
        if r > 0 {
            draw_hollow_circle_mut(canvas, center, r, MARKER_COLOR);
        }
    }
}
