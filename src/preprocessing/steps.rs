//! Individual image steps. Every step returns an 8-bit grayscale image.

use crate::error::ExtractError;
use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{filter3x3, median_filter};

/// Scans below this height are upscaled; recognition accuracy drops
/// sharply under roughly 200 DPI on a letter page
const MIN_PAGE_HEIGHT: u32 = 2200;
const MAX_DIMENSION: u32 = 5000;

/// Fraction of darkest/lightest pixels ignored when stretching contrast,
/// so a single speck or a white margin does not pin the range
const CLIP_FRACTION: f32 = 0.005;

pub fn grayscale(image: DynamicImage) -> Result<GrayImage, ExtractError> {
    Ok(image.into_luma8())
}

/// Upscale small scans; never downscale below the source resolution
pub fn upscale(image: GrayImage) -> Result<GrayImage, ExtractError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractError::PreprocessingError("empty page image".to_string()));
    }
    if height >= MIN_PAGE_HEIGHT {
        return Ok(image);
    }

    let scale = (MIN_PAGE_HEIGHT as f32 / height as f32)
        .min(MAX_DIMENSION as f32 / width.max(height) as f32);
    if scale <= 1.05 {
        return Ok(image);
    }

    let new_width = (width as f32 * scale).round() as u32;
    let new_height = (height as f32 * scale).round() as u32;
    Ok(image::imageops::resize(&image, new_width, new_height, FilterType::CatmullRom))
}

/// Percentile contrast stretch to the full 0-255 range
pub fn normalize(image: GrayImage) -> Result<GrayImage, ExtractError> {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let clip = (total as f32 * CLIP_FRACTION) as u64;
    let low = percentile_bound(histogram.iter().enumerate(), clip);
    let high = percentile_bound(histogram.iter().enumerate().rev(), clip);

    if high <= low {
        return Ok(image);
    }

    let span = (high - low) as f32;
    let mut stretched = image;
    for pixel in stretched.pixels_mut() {
        let v = pixel.0[0].clamp(low, high);
        *pixel = Luma([((v - low) as f32 / span * 255.0).round() as u8]);
    }
    Ok(stretched)
}

fn percentile_bound<'a>(bins: impl Iterator<Item = (usize, &'a u64)>, clip: u64) -> u8 {
    let mut seen = 0u64;
    let mut last = 0usize;
    for (value, count) in bins {
        last = value;
        seen += count;
        if seen > clip {
            break;
        }
    }
    last as u8
}

/// 3x3 median filter for scanner speckle
pub fn denoise(image: GrayImage) -> Result<GrayImage, ExtractError> {
    Ok(median_filter(&image, 1, 1))
}

pub fn sharpen(image: GrayImage) -> Result<GrayImage, ExtractError> {
    let kernel: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];
    Ok(filter3x3(&image, &kernel))
}

/// Global Otsu binarization; lab reports are printed text on a white page,
/// so a single threshold is enough
pub fn binarize(image: GrayImage) -> Result<GrayImage, ExtractError> {
    let level = otsu_level(&image);
    Ok(threshold(&image, level, ThresholdType::Binary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_grayscale_keeps_dimensions() {
        let mut img = RgbImage::new(40, 20);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let gray = grayscale(DynamicImage::ImageRgb8(img)).unwrap();
        assert_eq!(gray.dimensions(), (40, 20));
        assert!(gray.get_pixel(0, 0).0[0] > 0);
    }

    #[test]
    fn test_upscale_small_scan_only() {
        let small = upscale(GrayImage::new(850, 1100)).unwrap();
        assert_eq!(small.height(), MIN_PAGE_HEIGHT);
        assert_eq!(small.width(), 1700);

        let large = upscale(GrayImage::new(2550, 3300)).unwrap();
        assert_eq!(large.dimensions(), (2550, 3300));

        assert!(upscale(GrayImage::new(0, 0)).is_err());
    }

    #[test]
    fn test_normalize_stretches_low_contrast() {
        let img = GrayImage::from_fn(100, 10, |x, _| Luma([100 + (x as u8 / 2)]));
        let out = normalize(img).unwrap();
        let values: Vec<u8> = out.pixels().map(|p| p.0[0]).collect();
        assert_eq!(*values.iter().min().unwrap(), 0);
        assert_eq!(*values.iter().max().unwrap(), 255);
    }

    #[test]
    fn test_normalize_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        assert_eq!(normalize(img.clone()).unwrap(), img);
    }

    #[test]
    fn test_denoise_removes_isolated_speck() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([230]));
        img.put_pixel(4, 4, Luma([0]));
        assert_eq!(denoise(img).unwrap().get_pixel(4, 4).0[0], 230);
    }

    #[test]
    fn test_sharpen_widens_edge() {
        let img = GrayImage::from_fn(20, 10, |x, _| Luma([if x < 10 { 60 } else { 190 }]));
        let out = sharpen(img).unwrap();
        let diff = out.get_pixel(10, 5).0[0] as i32 - out.get_pixel(9, 5).0[0] as i32;
        assert!(diff >= 130, "edge contrast {diff}");
    }

    #[test]
    fn test_binarize_separates_text_from_page() {
        let mut img = GrayImage::from_pixel(60, 20, Luma([235]));
        for x in 10..50 {
            img.put_pixel(x, 10, Luma([30]));
        }
        let out = binarize(img).unwrap();
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(20, 10).0[0], 0);
        assert_eq!(out.get_pixel(20, 2).0[0], 255);
    }
}
