//! Image operations used to prepare frames for OCR
//!
//! Every operation takes an image by value and returns a new one, so a
//! preprocessing pipeline reads as a chain of plain calls:
//!
//! ```rust,ignore
//! let image = crop.apply(image);
//! let image = ensure_minimum_size(image, MIN_DIMENSION);
//! let image = pad_uniform(image, PADDING, Rgba::WHITE);
//! ```

use std::io::Cursor;
use std::str::FromStr;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TessError};

/// Smallest width or height handed to the OCR engine before padding.
pub const MIN_DIMENSION: u32 = 32;

/// Margin added on every side of the image before recognition.
pub const PADDING: u32 = 32;

/// A solid colour used to fill padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba> for image::Rgba<u8> {
    fn from(c: Rgba) -> Self {
        image::Rgba([c.r, c.g, c.b, c.a])
    }
}

/// Rectangular region expressed in percentages (0-100) of the source image.
///
/// Percentages keep a crop valid across resolutions: the same HUD element
/// sits at the same relative spot whether the frame is 720p or 4K.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub left_percent: f64,
    pub top_percent: f64,
    pub width_percent: f64,
    pub height_percent: f64,
}

impl Crop {
    pub fn new(left_percent: f64, top_percent: f64, width_percent: f64, height_percent: f64) -> Self {
        Self {
            left_percent,
            top_percent,
            width_percent,
            height_percent,
        }
    }

    /// Resolve the crop against concrete dimensions.
    ///
    /// Returns `(x, y, width, height)` in pixels, clamped to the image and
    /// never smaller than 1x1.
    pub fn region(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (x, w) = resolve_axis(self.left_percent, self.width_percent, width);
        let (y, h) = resolve_axis(self.top_percent, self.height_percent, height);
        (x, y, w, h)
    }

    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image;
        }
        let (x, y, w, h) = self.region(width, height);
        image.crop_imm(x, y, w, h)
    }
}

fn resolve_axis(offset_percent: f64, length_percent: f64, total: u32) -> (u32, u32) {
    if total == 0 {
        return (0, 0);
    }
    let to_px = |percent: f64| (percent.clamp(0.0, 100.0) / 100.0 * total as f64).round() as u32;
    let start = to_px(offset_percent).min(total - 1);
    let length = to_px(length_percent).clamp(1, total - start);
    (start, length)
}

impl FromStr for Crop {
    type Err = TessError;

    /// Parses `left,top,width,height` percentages.
    fn from_str(s: &str) -> Result<Self> {
        let parts = split_components(s, 4, "crop")?;
        Ok(Crop::new(
            parse_component(parts[0], "crop")?,
            parse_component(parts[1], "crop")?,
            parse_component(parts[2], "crop")?,
            parse_component(parts[3], "crop")?,
        ))
    }
}

/// Binarizes an image around a target colour.
///
/// Pixels within `threshold` (Euclidean RGB distance) of the target colour
/// become black, everything else white. Used to isolate text of a known
/// colour from a busy background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdFilter {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub threshold: f64,
}

impl ThresholdFilter {
    pub fn new(r: u8, g: u8, b: u8, threshold: f64) -> Self {
        Self { r, g, b, threshold }
    }

    fn matches(&self, pixel: &image::Rgba<u8>) -> bool {
        let dr = pixel[0] as f64 - self.r as f64;
        let dg = pixel[1] as f64 - self.g as f64;
        let db = pixel[2] as f64 - self.b as f64;
        (dr * dr + dg * dg + db * db).sqrt() <= self.threshold
    }

    pub fn apply(&self, image: DynamicImage) -> DynamicImage {
        let mut rgba = image.into_rgba8();
        for pixel in rgba.pixels_mut() {
            *pixel = if self.matches(pixel) {
                Rgba::BLACK.into()
            } else {
                Rgba::WHITE.into()
            };
        }
        DynamicImage::ImageRgba8(rgba)
    }
}

impl FromStr for ThresholdFilter {
    type Err = TessError;

    /// Parses `r,g,b,threshold`; channels are integers in 0-255.
    fn from_str(s: &str) -> Result<Self> {
        let parts = split_components(s, 4, "threshold")?;
        Ok(ThresholdFilter::new(
            parse_component(parts[0], "threshold colour channel")?,
            parse_component(parts[1], "threshold colour channel")?,
            parse_component(parts[2], "threshold colour channel")?,
            parse_component(parts[3], "threshold distance")?,
        ))
    }
}

fn split_components<'a>(s: &'a str, expected: usize, what: &str) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(TessError::Config(format!(
            "{what} expects {expected} comma-separated values, got {}",
            parts.len()
        )));
    }
    Ok(parts)
}

fn parse_component<T: FromStr>(part: &str, what: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    part.parse::<T>()
        .map_err(|e| TessError::Config(format!("invalid {what} value '{part}': {e}")))
}

/// Upscale the image until both sides are at least `min_dimension`.
///
/// Aspect ratio is preserved; images that already satisfy the minimum are
/// returned unchanged.
pub fn ensure_minimum_size(image: DynamicImage, min_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || (width >= min_dimension && height >= min_dimension) {
        return image;
    }

    let scale = (min_dimension as f64 / width as f64).max(min_dimension as f64 / height as f64);
    // Absorb float noise so 10 * 3.2 stays 32 rather than ceiling to 33.
    let scaled = |side: u32| ((side as f64 * scale - 1e-9).ceil() as u32).max(min_dimension);
    let new_width = scaled(width);
    let new_height = scaled(height);

    image.resize_exact(new_width, new_height, FilterType::CatmullRom)
}

/// Surround the image with a `margin` pixel border of a solid colour.
pub fn pad_uniform(image: DynamicImage, margin: u32, color: Rgba) -> DynamicImage {
    let (width, height) = image.dimensions();
    let mut canvas = RgbaImage::from_pixel(width + 2 * margin, height + 2 * margin, color.into());
    image::imageops::replace(&mut canvas, &image.into_rgba8(), margin as i64, margin as i64);
    DynamicImage::ImageRgba8(canvas)
}

/// Raw RGBA8 pixels plus dimensions; the payload of a recognition job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageData {
    /// Encode the pixels as PNG, the form the Tesseract bindings read from memory.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            TessError::Recognition(format!(
                "pixel buffer of {} bytes does not match {}x{}",
                self.data.len(),
                self.width,
                self.height
            ))
        })?;

        let mut output = Vec::new();
        DynamicImage::ImageRgba8(rgba).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
        Ok(output)
    }
}

/// Extract raw pixel data from an image.
pub fn image_data(image: &DynamicImage) -> ImageData {
    let rgba = image.to_rgba8();
    ImageData {
        width: rgba.width(),
        height: rgba.height(),
        data: rgba.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solid(width: u32, height: u32, color: Rgba) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color.into()))
    }

    #[test]
    fn test_crop_region_percentages() {
        let crop = Crop::new(25.0, 50.0, 50.0, 25.0);
        assert_eq!(crop.region(200, 100), (50, 50, 100, 25));
    }

    #[test]
    fn test_crop_region_clamps_to_bounds() {
        let crop = Crop::new(90.0, 90.0, 50.0, 50.0);
        assert_eq!(crop.region(100, 100), (90, 90, 10, 10));
    }

    #[test]
    fn test_crop_region_never_empty() {
        let crop = Crop::new(100.0, 100.0, 0.0, 0.0);
        assert_eq!(crop.region(10, 10), (9, 9, 1, 1));
    }

    #[test]
    fn test_crop_apply_dimensions() {
        let image = solid(200, 100, Rgba::BLACK);
        let cropped = Crop::new(0.0, 0.0, 50.0, 50.0).apply(image);
        assert_eq!(cropped.dimensions(), (100, 50));
    }

    #[test]
    fn test_crop_from_str() {
        let crop: Crop = "10, 20, 30, 40".parse().unwrap();
        assert_eq!(crop, Crop::new(10.0, 20.0, 30.0, 40.0));
        assert!("10,20,30".parse::<Crop>().is_err());
        assert!("a,b,c,d".parse::<Crop>().is_err());
    }

    #[test]
    fn test_ensure_minimum_size_noop_when_large_enough() {
        let image = solid(32, 40, Rgba::WHITE);
        let result = ensure_minimum_size(image, 32);
        assert_eq!(result.dimensions(), (32, 40));
    }

    #[test]
    fn test_ensure_minimum_size_upscales_preserving_aspect() {
        let image = solid(10, 20, Rgba::WHITE);
        let result = ensure_minimum_size(image, 32);
        assert_eq!(result.dimensions(), (32, 64));
    }

    #[test]
    fn test_ensure_minimum_size_only_short_side() {
        let image = solid(200, 16, Rgba::WHITE);
        let result = ensure_minimum_size(image, 32);
        assert_eq!(result.dimensions(), (400, 32));
    }

    #[test]
    fn test_pad_uniform_border() {
        let image = solid(4, 2, Rgba::BLACK);
        let padded = pad_uniform(image, 3, Rgba::WHITE).to_rgba8();

        assert_eq!(padded.dimensions(), (10, 8));
        assert_eq!(*padded.get_pixel(0, 0), Rgba::WHITE.into());
        assert_eq!(*padded.get_pixel(9, 7), Rgba::WHITE.into());
        assert_eq!(*padded.get_pixel(2, 3), Rgba::WHITE.into());
        assert_eq!(*padded.get_pixel(3, 3), Rgba::BLACK.into());
        assert_eq!(*padded.get_pixel(6, 4), Rgba::BLACK.into());
        assert_eq!(*padded.get_pixel(7, 4), Rgba::WHITE.into());
    }

    #[test]
    fn test_threshold_isolates_target_colour() {
        let mut rgba = RgbaImage::from_pixel(2, 1, image::Rgba([250, 10, 10, 255]));
        rgba.put_pixel(1, 0, image::Rgba([10, 250, 10, 255]));

        let filter = ThresholdFilter::new(255, 0, 0, 30.0);
        let result = filter.apply(DynamicImage::ImageRgba8(rgba)).to_rgba8();

        assert_eq!(*result.get_pixel(0, 0), Rgba::BLACK.into());
        assert_eq!(*result.get_pixel(1, 0), Rgba::WHITE.into());
    }

    #[test]
    fn test_threshold_from_str_rejects_bad_channel() {
        assert!("300,0,0,10".parse::<ThresholdFilter>().is_err());
        assert!("-1,0,0,10".parse::<ThresholdFilter>().is_err());
        assert!("255,0,0".parse::<ThresholdFilter>().is_err());
        let filter: ThresholdFilter = "255,255,0,42.5".parse().unwrap();
        assert_eq!(filter, ThresholdFilter::new(255, 255, 0, 42.5));
    }

    #[test]
    fn test_threshold_from_str_rejects_fractional_channel() {
        let result = "12.9,0,0,10".parse::<ThresholdFilter>();
        assert!(matches!(result, Err(TessError::Config(_))));
        let filter: ThresholdFilter = " 12, 0 ,0,10".parse().unwrap();
        assert_eq!(filter, ThresholdFilter::new(12, 0, 0, 10.0));
    }

    #[test]
    fn test_image_data_is_rgba() {
        let image = DynamicImage::new_luma8(3, 2);
        let data = image_data(&image);
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.data.len(), 3 * 2 * 4);
    }

    #[test]
    fn test_image_data_to_png_roundtrips_dimensions() {
        let data = image_data(&solid(5, 7, Rgba::WHITE));
        let png = data.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (5, 7));
    }

    #[test]
    fn test_image_data_to_png_rejects_short_buffer() {
        let data = ImageData {
            width: 4,
            height: 4,
            data: vec![0; 8],
        };
        assert!(matches!(data.to_png(), Err(TessError::Recognition(_))));
    }
}
