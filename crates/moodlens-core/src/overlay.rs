//! HUD overlay: face outlines, corner accents and emotion labels.

use crate::types::{DetectionResult, FaceDetection, Rectangle};
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const OUTLINE_COLOR: Rgb<u8> = Rgb([0x4a, 0xde, 0x80]);
const OUTLINE_WIDTH: u32 = 2;
const CORNER_COLOR: Rgb<u8> = Rgb([0x22, 0xc5, 0x5e]);
const CORNER_THICKNESS: u32 = 4;
const CORNER_MAX_LEN: u32 = 20;
const PANEL_WIDTH: u32 = 180;
const PANEL_HEIGHT: u32 = 40;
/// Opacity of the black label panel.
const PANEL_ALPHA: f32 = 0.7;
const TEXT_COLOR: Rgb<u8> = Rgb([0xff, 0xff, 0xff]);
const TEXT_SCALE: f32 = 18.0;
const TEXT_INSET_X: i32 = 10;
const TEXT_INSET_Y: i32 = 11;

/// Shown for labels missing from the glyph table.
pub const DEFAULT_GLYPH: &str = "🤖";

/// Emoji for an emotion label, matched case-insensitively.
pub fn glyph_for(label: &str) -> &'static str {
    match label.to_lowercase().as_str() {
        "happy" => "😁",
        "sad" => "😢",
        "angry" => "😡",
        "surprise" => "😲",
        "neutral" => "😐",
        "fear" => "😱",
        "disgust" => "🤢",
        _ => DEFAULT_GLYPH,
    }
}

/// `"<glyph> <label> <pct>%"`, e.g. `"😁 happy 66%"`.
pub fn label_text(result: &DetectionResult) -> String {
    let pct = (result.confidence * 100.0).round() as u32;
    format!("{} {} {}%", glyph_for(&result.label), result.label, pct)
}

/// Corner accent arm length for a face `width` pixels wide.
pub fn corner_length(width: u32) -> u32 {
    (width / 4).min(CORNER_MAX_LEN)
}

/// Top-left of the label panel: above the face, kept on the surface.
pub fn panel_origin(rect: &Rectangle, surface_width: u32) -> (u32, u32) {
    let x = rect.x.min(surface_width.saturating_sub(PANEL_WIDTH));
    let y = rect.y.saturating_sub(PANEL_HEIGHT);
    (x, y)
}

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to read font {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    InvalidFont(String),
}

/// Draws detection results onto a frame in place.
pub struct Overlay {
    font: Option<FontVec>,
    warned_no_font: bool,
}

impl Overlay {
    /// Without a font the label panels are drawn but carry no text.
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            warned_no_font: false,
        }
    }

    pub fn from_font_file(path: &Path) -> Result<Self, OverlayError> {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| OverlayError::InvalidFont(path.display().to_string()))?;
        Ok(Self::new(Some(font)))
    }

    pub fn draw(&mut self, surface: &mut RgbImage, faces: &[FaceDetection]) {
        for face in faces {
            if face.rect.is_empty() {
                continue;
            }
            draw_outline(surface, &face.rect);
            draw_corners(surface, &face.rect);
            self.draw_label(surface, &face.rect, &face.result);
        }
    }

    fn draw_label(&mut self, surface: &mut RgbImage, rect: &Rectangle, result: &DetectionResult) {
        let (px, py) = panel_origin(rect, surface.width());
        shade(surface, px, py, PANEL_WIDTH, PANEL_HEIGHT, PANEL_ALPHA);

        let Some(font) = &self.font else {
            if !self.warned_no_font {
                tracing::debug!("no overlay font configured; drawing label panels without text");
                self.warned_no_font = true;
            }
            return;
        };
        draw_text_mut(
            surface,
            TEXT_COLOR,
            px as i32 + TEXT_INSET_X,
            py as i32 + TEXT_INSET_Y,
            PxScale::from(TEXT_SCALE),
            font,
            &label_text(result),
        );
    }
}

fn draw_outline(surface: &mut RgbImage, rect: &Rectangle) {
    for inset in 0..OUTLINE_WIDTH {
        let w = rect.width.saturating_sub(2 * inset);
        let h = rect.height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let r = Rect::at((rect.x + inset) as i32, (rect.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(surface, r, OUTLINE_COLOR);
    }
}

/// L-shaped accents at each corner, arms running along the face edges.
fn draw_corners(surface: &mut RgbImage, rect: &Rectangle) {
    let len = corner_length(rect.width) as i32;
    let t = CORNER_THICKNESS as i32;
    let half = t / 2;
    let (left, top) = (rect.x as i32, rect.y as i32);
    let (right, bottom) = (left + rect.width as i32, top + rect.height as i32);

    for (cx, cy, dx, dy) in [
        (left, top, 1, 1),
        (right, top, -1, 1),
        (left, bottom, 1, -1),
        (right, bottom, -1, -1),
    ] {
        let hx = if dx > 0 { cx - half } else { cx - len - half };
        let vy = if dy > 0 { cy - half } else { cy - len - half };
        let arm_len = (len + t) as u32;
        draw_filled_rect_mut(surface, Rect::at(hx, cy - half).of_size(arm_len, t as u32), CORNER_COLOR);
        draw_filled_rect_mut(surface, Rect::at(cx - half, vy).of_size(t as u32, arm_len), CORNER_COLOR);
    }
}

/// Blend black over a region at `alpha`, clipped to the surface.
fn shade(surface: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, alpha: f32) {
    let x_end = x.saturating_add(width).min(surface.width());
    let y_end = y.saturating_add(height).min(surface.height());
    let keep = 1.0 - alpha;
    for py in y..y_end {
        for px in x..x_end {
            let pixel = surface.get_pixel_mut(px, py);
            for c in pixel.0.iter_mut() {
                *c = (f32::from(*c) * keep).round() as u8;
            }
        }
    }
}
