//! Face location on grayscale frames.
//!
//! `CascadeLocator` wraps the SeetaFace funnel-structured cascade from
//! `rustface`. The detector is not `Send`; it must be built on the thread
//! that uses it.

use crate::types::Rectangle;
use image::GrayImage;
use rustface::{Detector, ImageData};
use std::path::Path;
use thiserror::Error;

/// The cascade's smallest supported detection window.
pub const MIN_WINDOW: u32 = 20;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("cascade model not found: {0} (place seeta_fd_frontal_v1.0.bin in the model directory)")]
    ModelNotFound(String),
    #[error("failed to load cascade model: {0}")]
    Load(#[from] std::io::Error),
    #[error("invalid locator parameter: {0}")]
    InvalidParams(String),
}

/// Finds candidate face rectangles in a grayscale raster.
pub trait FaceLocator {
    fn locate(&mut self, gray: &GrayImage) -> Result<Vec<Rectangle>, LocatorError>;
}

/// Cascade tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorParams {
    /// Size ratio between successive pyramid levels (> 1).
    pub scale_factor: f32,
    pub min_face_size: u32,
    /// `None` means bounded only by the frame.
    pub max_face_size: Option<u32>,
    pub score_threshold: f64,
    pub window_step: u32,
}

impl Default for LocatorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_face_size: MIN_WINDOW,
            max_face_size: None,
            score_threshold: 2.0,
            window_step: 4,
        }
    }
}

impl LocatorParams {
    fn validate(&self) -> Result<(), LocatorError> {
        // rustface accepts pyramid steps in [0.01, 0.99].
        if !(self.scale_factor > 1.0 && self.scale_factor <= 100.0) || 1.0 / self.scale_factor > 0.99 {
            return Err(LocatorError::InvalidParams(format!(
                "scale factor must be in (1.01, 100], got {}",
                self.scale_factor
            )));
        }
        if self.min_face_size < MIN_WINDOW {
            return Err(LocatorError::InvalidParams(format!(
                "minimum face size must be at least {MIN_WINDOW}, got {}",
                self.min_face_size
            )));
        }
        if self.window_step == 0 {
            return Err(LocatorError::InvalidParams("window step must be positive".into()));
        }
        Ok(())
    }
}

/// rustface-backed cascade locator.
pub struct CascadeLocator {
    detector: Box<dyn Detector>,
}

impl CascadeLocator {
    /// Load the cascade model file and apply `params`.
    pub fn load(model_path: &str, params: &LocatorParams) -> Result<Self, LocatorError> {
        if !Path::new(model_path).exists() {
            return Err(LocatorError::ModelNotFound(model_path.to_string()));
        }
        params.validate()?;

        let mut detector = rustface::create_detector(model_path)?;
        detector.set_min_face_size(params.min_face_size);
        if let Some(max) = params.max_face_size {
            detector.set_max_face_size(max);
        }
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor);
        detector.set_score_thresh(params.score_threshold);
        detector.set_slide_window_step(params.window_step, params.window_step);

        tracing::info!(path = model_path, ?params, "loaded face cascade");

        Ok(Self { detector })
    }
}

impl FaceLocator for CascadeLocator {
    fn locate(&mut self, gray: &GrayImage) -> Result<Vec<Rectangle>, LocatorError> {
        let (width, height) = gray.dimensions();
        if width < MIN_WINDOW || height < MIN_WINDOW {
            return Ok(Vec::new());
        }

        let mut image = ImageData::new(gray.as_raw(), width, height);
        let faces = self.detector.detect(&mut image);

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                clamp_to_frame(bbox.x(), bbox.y(), bbox.width(), bbox.height(), width, height)
            })
            .collect())
    }
}

/// Clip a detector box to the frame; boxes left with no area are dropped.
fn clamp_to_frame(x: i32, y: i32, w: u32, h: u32, frame_w: u32, frame_h: u32) -> Option<Rectangle> {
    let x0 = i64::from(x).clamp(0, i64::from(frame_w));
    let y0 = i64::from(y).clamp(0, i64::from(frame_h));
    let x1 = (i64::from(x) + i64::from(w)).clamp(0, i64::from(frame_w));
    let y1 = (i64::from(y) + i64::from(h)).clamp(0, i64::from(frame_h));

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rectangle::new(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}
