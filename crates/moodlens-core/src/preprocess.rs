//! Face crop → classifier input tensor.
//!
//! The classifier was trained on 64×64 RGB crops laid out planar
//! (all red, then all green, then all blue, each plane row-major) with
//! values in [0, 1]. Any other layout classifies silently wrong.

use crate::types::Rectangle;
use image::RgbImage;
use ndarray::{Array4, ArrayView2, ArrayView4, Axis};
use thiserror::Error;

pub const INPUT_SIZE: usize = 64;
pub const INPUT_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum PreprocessError {
    #[error("face rectangle has zero area: {0:?}")]
    ZeroArea(Rectangle),
    #[error("face rectangle {rect:?} exceeds {width}x{height} frame")]
    OutOfBounds {
        rect: Rectangle,
        width: u32,
        height: u32,
    },
}

/// Classifier input: shape (1, 3, 64, 64), planar RGB, values in [0, 1].
///
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct Tensor(Array4<f32>);

impl Tensor {
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// One colour plane (0 = red, 1 = green, 2 = blue).
    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.0.index_axis(Axis(0), 0).index_axis_move(Axis(0), channel)
    }

    /// All values in memory order.
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.0.iter()
    }
}

/// Crop `rect` out of `frame`, resample to 64×64 and normalize to a planar tensor.
pub fn crop_normalize(frame: &RgbImage, rect: &Rectangle) -> Result<Tensor, PreprocessError> {
    if rect.is_empty() {
        return Err(PreprocessError::ZeroArea(*rect));
    }
    if !rect.fits_within(frame.width(), frame.height()) {
        return Err(PreprocessError::OutOfBounds {
            rect: *rect,
            width: frame.width(),
            height: frame.height(),
        });
    }

    let resized = resize_region(frame, rect, INPUT_SIZE);

    let mut tensor = Array4::<f32>::zeros((1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = resized[y * INPUT_SIZE + x];
            for c in 0..INPUT_CHANNELS {
                tensor[[0, c, y, x]] = f32::from(pixel[c]) / 255.0;
            }
        }
    }

    Ok(Tensor(tensor))
}

/// Bilinear resample of `rect` to `size`×`size` RGB pixels.
///
/// Samples are rounded back to 8 bits, so a uniform region stays exactly
/// uniform after resampling.
fn resize_region(frame: &RgbImage, rect: &Rectangle, size: usize) -> Vec<[u8; 3]> {
    let src_w = rect.width as usize;
    let src_h = rect.height as usize;
    let scale_x = src_w as f32 / size as f32;
    let scale_y = src_h as f32 / size as f32;

    let sample = |x: usize, y: usize| -> [u8; 3] {
        frame.get_pixel(rect.x + x as u32, rect.y + y as u32).0
    };

    let mut out = Vec::with_capacity(size * size);
    for y in 0..size {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let (tl, tr, bl, br) = (sample(x0, y0), sample(x1, y0), sample(x0, y1), sample(x1, y1));
            let mut pixel = [0u8; 3];
            for c in 0..3 {
                let val = f32::from(tl[c]) * (1.0 - fx) * (1.0 - fy)
                    + f32::from(tr[c]) * fx * (1.0 - fy)
                    + f32::from(bl[c]) * (1.0 - fx) * fy
                    + f32::from(br[c]) * fx * fy;
                pixel[c] = val.round().clamp(0.0, 255.0) as u8;
            }
            out.push(pixel);
        }
    }
    out
}
