//! Multi-scale sliding-window cascade evaluation

use cascade_faces_common::Rectangle;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cascade::{CascadeModel, SplitNode, BASE_SIZE};
use crate::config::CascadeParameters;
use crate::error::FaceDetectionError;
use crate::pixels::PixelBuffer;

/// Window accepted by every stage of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Window center row
    pub row: i32,
    /// Window center column
    pub col: i32,
    /// Window edge length
    pub scale: i32,
    /// Accumulated cascade score
    pub score: f32,
}

impl Detection {
    /// Square window covered by this detection
    #[must_use]
    #[inline]
    pub fn window(&self) -> Rectangle {
        Rectangle::centered(self.row, self.col, self.scale)
    }
}

/// Window edges visited for a `width` x `height` buffer, ascending.
///
/// Starts at `min_size` and grows by `scale_factor` (at least one pixel per
/// step) while the edge is within `max_size` and the shorter buffer side.
#[must_use]
pub fn window_scales(params: &CascadeParameters, width: u32, height: u32) -> Vec<i32> {
    let limit = params.max_size.min(width.min(height));
    let mut scales = Vec::new();
    let mut scale = params.min_size;
    while scale <= limit {
        scales.push(scale as i32);
        let grown = (f64::from(scale) * params.scale_factor) as u32;
        scale = grown.max(scale.saturating_add(1));
    }
    scales
}

/// Grid step for a window edge
#[must_use]
#[inline]
pub fn grid_step(scale: i32, shift_factor: f64) -> usize {
    ((f64::from(scale) * shift_factor).round() as usize).max(1)
}

/// Run the cascade over one window centered at `(row, col)`.
///
/// Returns the accumulated score, or `None` as soon as a stage total is
/// below that stage's threshold.
#[must_use]
pub fn classify_window(
    model: &CascadeModel,
    pixels: &PixelBuffer,
    row: i32,
    col: i32,
    scale: i32,
) -> Option<f32> {
    let r = row * BASE_SIZE;
    let c = col * BASE_SIZE;
    let sample = |dy: i8, dx: i8| {
        let y = (r + i32::from(dy) * scale).div_euclid(BASE_SIZE);
        let x = (c + i32::from(dx) * scale).div_euclid(BASE_SIZE);
        i32::from(pixels.clamped(y, x))
    };
    let split = |node: &SplitNode| {
        sample(node.dy1, node.dx1) - sample(node.dy2, node.dx2) > node.threshold
    };

    let mut score = 0.0f32;
    for stage in model.stages() {
        for tree in stage.trees() {
            score += tree.predict(split);
        }
        if score < stage.threshold() {
            return None;
        }
    }
    Some(score)
}

/// Evaluate every fitting window of one edge length
fn scan_scale(
    model: &CascadeModel,
    pixels: &PixelBuffer,
    scale: i32,
    shift_factor: f64,
) -> Vec<Detection> {
    let half = scale / 2;
    let step = grid_step(scale, shift_factor);
    let last_row = pixels.height() as i32 - (scale - half);
    let last_col = pixels.width() as i32 - (scale - half);

    let mut windows = 0usize;
    let mut detections = Vec::new();
    for row in (half..=last_row).step_by(step) {
        for col in (half..=last_col).step_by(step) {
            windows += 1;
            if let Some(score) = classify_window(model, pixels, row, col, scale) {
                detections.push(Detection {
                    row,
                    col,
                    scale,
                    score,
                });
            }
        }
    }

    trace!(
        "scale {}: {} windows, {} accepted (step {})",
        scale,
        windows,
        detections.len(),
        step
    );
    detections
}

fn check_inputs(
    pixels: &PixelBuffer,
    params: &CascadeParameters,
) -> Result<(), FaceDetectionError> {
    if pixels.is_empty() {
        return Err(FaceDetectionError::InvalidParameters(format!(
            "empty pixel buffer ({}x{})",
            pixels.width(),
            pixels.height()
        )));
    }
    params.validate()
}

/// Raw detections over all scales, scales evaluated in parallel.
///
/// Output order matches [`detect_sequential`]: ascending scale, then row,
/// then column.
pub fn detect(
    pixels: &PixelBuffer,
    model: &CascadeModel,
    params: &CascadeParameters,
) -> Result<Vec<Detection>, FaceDetectionError> {
    check_inputs(pixels, params)?;
    let scales = window_scales(params, pixels.width(), pixels.height());

    let per_scale: Vec<Vec<Detection>> = scales
        .par_iter()
        .map(|&scale| scan_scale(model, pixels, scale, params.shift_factor))
        .collect();
    let detections: Vec<Detection> = per_scale.into_iter().flatten().collect();

    debug!(
        "Cascade accepted {} windows over {} scales",
        detections.len(),
        scales.len()
    );
    Ok(detections)
}

/// Single-threaded variant of [`detect`]
pub fn detect_sequential(
    pixels: &PixelBuffer,
    model: &CascadeModel,
    params: &CascadeParameters,
) -> Result<Vec<Detection>, FaceDetectionError> {
    check_inputs(pixels, params)?;
    let scales = window_scales(params, pixels.width(), pixels.height());

    let detections: Vec<Detection> = scales
        .iter()
        .flat_map(|&scale| scan_scale(model, pixels, scale, params.shift_factor))
        .collect();

    debug!(
        "Cascade accepted {} windows over {} scales",
        detections.len(),
        scales.len()
    );
    Ok(detections)
}
