//! Region crop, aspect-preserving resize with right padding, and
//! `[-1, 1]` normalization into a channels-first tensor.

use image::{Rgb, RgbImage};
use ocr_common::geometry_types::OrientedRectangle;
use ocr_common::{OcrError, Result, Tensor};
use ocr_engine_core::crop_oriented_rectangle;

/// Fixed output size for recognizer inputs; configurable per [`RecognizerConfig`].
pub struct RecognizerConfig {
    pub target_width: u32,
    pub target_height: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self { target_width: 160, target_height: 48 }
    }
}

pub fn preprocess_region(
    image: &RgbImage,
    rect: &OrientedRectangle,
    config: &RecognizerConfig,
) -> Result<Tensor> {
    let (logical_w, logical_h) = rect.logical_size();
    if logical_w < 1.0 || logical_h < 1.0 {
        return Err(OcrError::EmptyImage);
    }

    let cropped = crop_oriented_rectangle(image, rect)?;
    let (cw, ch) = cropped.dimensions();
    if cw == 0 || ch == 0 {
        return Err(OcrError::EmptyImage);
    }

    let scale = (config.target_width as f64 / cw as f64).min(config.target_height as f64 / ch as f64);
    let fit_w = ((cw as f64 * scale).round() as u32).clamp(1, config.target_width);
    let fit_h = ((ch as f64 * scale).round() as u32).clamp(1, config.target_height);

    let resized = image::imageops::resize(&cropped, fit_w, fit_h, image::imageops::FilterType::Triangle);

    let mut canvas = RgbImage::new(config.target_width, config.target_height);
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb([0, 0, 0]);
    }
    image::imageops::replace(&mut canvas, &resized, 0, 0);

    let plane = (config.target_height as usize) * (config.target_width as usize);
    let mut data = vec![0.0f32; 3 * plane];
    for y in 0..config.target_height {
        for x in 0..config.target_width {
            let pixel = canvas.get_pixel(x, y);
            let idx = (y as usize) * (config.target_width as usize) + (x as usize);
            for c in 0..3 {
                data[c * plane + idx] = (pixel[c] as f32 - 127.5) / 127.5;
            }
        }
    }

    Tensor::new(data, vec![3, config.target_height as i64, config.target_width as i64])
}
