//! Image restoration pipeline
//!
//! A fixed sequence of transforms that improves decode odds on poor captures:
//! grayscale, scale, contrast stretch, sharpen, binarize.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Restoration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestorationConfig {
    /// Larger side is reduced to this size
    pub max_dimension: u32,
    /// Smaller images are upscaled until the larger side reaches this size
    pub min_dimension: u32,
    /// Stretch the histogram to the full 0..=255 range
    pub contrast_stretch: bool,
    /// Apply a 3x3 sharpening kernel
    pub sharpen: bool,
    /// Otsu binarization as the last step
    pub binarize: bool,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1000,
            min_dimension: 240,
            contrast_stretch: true,
            sharpen: true,
            binarize: true,
        }
    }
}

/// Applies the restoration sequence to an image
#[derive(Debug, Clone, Default)]
pub struct ImageRestorer {
    config: RestorationConfig,
}

impl ImageRestorer {
    pub fn new(config: RestorationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RestorationConfig {
        &self.config
    }

    /// Full pipeline starting from any color image
    pub fn restore(&self, img: &DynamicImage) -> GrayImage {
        self.restore_gray(&img.to_luma8())
    }

    /// Full pipeline on an image that is already grayscale
    pub fn restore_gray(&self, img: &GrayImage) -> GrayImage {
        let mut result = self.scale(img);

        if self.config.contrast_stretch {
            result = contrast_stretch(&result);
        }
        if self.config.sharpen {
            result = imageproc::filter::sharpen3x3(&result);
        }
        if self.config.binarize {
            let level = imageproc::contrast::otsu_level(&result);
            log::debug!("Restoration: otsu level {}", level);
            result = imageproc::contrast::threshold(&result, level);
        }

        result
    }

    /// Bring the image into the configured size window
    pub fn scale(&self, img: &GrayImage) -> GrayImage {
        let (width, height) = img.dimensions();
        let larger = width.max(height);

        if larger > self.config.max_dimension {
            return resize(img, self.config.max_dimension);
        }
        if larger > 0 && larger < self.config.min_dimension {
            let factor = self.config.min_dimension.div_ceil(larger);
            // Nearest keeps module edges hard when enlarging
            return image::imageops::resize(
                img,
                width * factor,
                height * factor,
                image::imageops::FilterType::Nearest,
            );
        }

        img.clone()
    }
}

/// Downscale with preserved aspect ratio; images already within bounds are returned as is
pub fn resize(img: &GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = img.dimensions();

    if width <= max_dimension && height <= max_dimension {
        return img.clone();
    }

    let scale = if width > height {
        max_dimension as f32 / width as f32
    } else {
        max_dimension as f32 / height as f32
    };

    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);

    image::imageops::resize(
        img,
        new_width,
        new_height,
        image::imageops::FilterType::Triangle,
    )
}

/// Color-inverted copy (reverse-contrast codes)
pub fn invert(img: &GrayImage) -> GrayImage {
    let mut result = img.clone();
    image::imageops::invert(&mut result);
    result
}

/// Linear histogram stretch to 0..=255
pub fn contrast_stretch(img: &GrayImage) -> GrayImage {
    let mut min_val = u8::MAX;
    let mut max_val = u8::MIN;

    for p in img.pixels() {
        min_val = min_val.min(p.0[0]);
        max_val = max_val.max(p.0[0]);
    }

    if min_val >= max_val {
        return img.clone();
    }

    imageproc::contrast::stretch_contrast(img, min_val, max_val)
}
