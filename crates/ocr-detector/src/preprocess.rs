//! Aspect-preserving resize onto a 32-aligned canvas, black-padded, plus
//! per-channel normalization into a channels-first tensor.

use image::{Rgb, RgbImage};
use ocr_common::{OcrError, Result, Tensor};

const MAX_W: u32 = 1333;
const MAX_H: u32 = 736;
const ALIGN: u32 = 32;
const MEANS: [f32; 3] = [123.675, 116.28, 103.53];
const STDS: [f32; 3] = [58.395, 57.12, 57.375];

/// Resized/padded canvas plus the bookkeeping needed to map detections back
/// into the original image's coordinate space.
pub struct Preprocessed {
    pub tensor: Tensor,
    pub padded_width: u32,
    pub padded_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

fn round_up_to_multiple(x: u32, m: u32) -> u32 {
    ((x + m - 1) / m) * m
}

pub fn preprocess(image: &RgbImage) -> Result<Preprocessed> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(OcrError::EmptyImage);
    }

    // Scale against the already-32-aligned bounds, not the raw MAX_W/MAX_H:
    // otherwise a width-bound (or height-bound) image scales to exactly
    // 1333 (or 736), round_up_to_multiple then overshoots to the next
    // multiple of 32 and gets clamped back down -- silently shrinking that
    // axis's fit target while the other axis keeps the unclamped scale,
    // skewing the aspect ratio.
    let max_w_aligned = (MAX_W / ALIGN) * ALIGN;
    let max_h_aligned = (MAX_H / ALIGN) * ALIGN;

    let scale = (max_w_aligned as f64 / orig_w as f64).min(max_h_aligned as f64 / orig_h as f64);
    let scaled_w = ((orig_w as f64 * scale).round() as u32).clamp(1, max_w_aligned);
    let scaled_h = ((orig_h as f64 * scale).round() as u32).clamp(1, max_h_aligned);

    let padded_w = round_up_to_multiple(scaled_w, ALIGN).min(max_w_aligned).max(ALIGN);
    let padded_h = round_up_to_multiple(scaled_h, ALIGN).min(max_h_aligned).max(ALIGN);

    let fit_w = scaled_w;
    let fit_h = scaled_h;

    let resized = image::imageops::resize(image, fit_w, fit_h, image::imageops::FilterType::Triangle);

    let mut canvas = RgbImage::new(padded_w, padded_h);
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb([0, 0, 0]);
    }
    image::imageops::replace(&mut canvas, &resized, 0, 0);

    let plane = (padded_h as usize) * (padded_w as usize);
    let mut data = vec![0.0f32; 3 * plane];
    for y in 0..padded_h {
        for x in 0..padded_w {
            let pixel = canvas.get_pixel(x, y);
            let idx = (y as usize) * (padded_w as usize) + (x as usize);
            for c in 0..3 {
                data[c * plane + idx] = (pixel[c] as f32 - MEANS[c]) / STDS[c];
            }
        }
    }

    let tensor = Tensor::new(data, vec![3, padded_h as i64, padded_w as i64])?;
    Ok(Preprocessed {
        tensor,
        padded_width: padded_w,
        padded_height: padded_h,
        original_width: orig_w,
        original_height: orig_h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_fails() {
        let image = RgbImage::new(0, 0);
        assert!(matches!(preprocess(&image), Err(OcrError::EmptyImage)));
    }

    #[test]
    fn padded_dimensions_are_32_aligned_and_bounded() {
        let image = RgbImage::new(500, 300);
        let out = preprocess(&image).unwrap();
        assert_eq!(out.padded_width % 32, 0);
        assert_eq!(out.padded_height % 32, 0);
        assert!(out.padded_width <= 1333);
        assert!(out.padded_height <= 736);
        assert_eq!(out.tensor.shape(), &[3, out.padded_height as i64, out.padded_width as i64]);
    }

    #[test]
    fn normalizes_white_pixels_to_expected_value() {
        let image = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let out = preprocess(&image).unwrap();
        let expected_r = (255.0 - MEANS[0]) / STDS[0];
        assert!((out.tensor.data()[0] - expected_r).abs() < 1e-4);
    }

    #[test]
    fn width_bound_image_keeps_padded_bounds_within_limits() {
        // 2000x1000 is width-bound: scaling to fit 1333x736 is governed by
        // the width axis, which is exactly the case that previously
        // overshot 1312 (the 32-aligned width bound) before being clamped.
        let image = RgbImage::new(2000, 1000);
        let out = preprocess(&image).unwrap();
        assert!(out.padded_width <= 1333 && out.padded_width % 32 == 0);
        assert!(out.padded_height <= 736 && out.padded_height % 32 == 0);
    }
}
