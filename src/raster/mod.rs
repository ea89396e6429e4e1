//! Ink raster handling shared by preprocessing and segmentation.
//!
//! All geometry is computed on a luma view of the raster where fully
//! transparent pixels read as white background. Pixel buffers come from the
//! `image` crate and are dropped by whichever function allocated them.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};

use crate::error::RecognitionError;

pub mod preprocess;
pub mod segment;

pub(crate) const BACKGROUND_LUMA: u8 = u8::MAX;

/// Caller-owned ink image. Width and height are always at least 1.
#[derive(Debug, Clone)]
pub enum InkRaster {
    Gray(GrayImage),
    /// Straight (non-premultiplied) alpha; alpha 0 is background.
    Rgba(RgbaImage),
}

impl InkRaster {
    pub fn from_gray_pixels(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, RecognitionError> {
        let image = GrayImage::from_raw(width, height, pixels).ok_or_else(|| {
            RecognitionError::invalid_input(format!(
                "grayscale buffer does not match {width}x{height}"
            ))
        })?;
        Self::try_from(image)
    }

    pub fn from_rgba_pixels(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, RecognitionError> {
        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            RecognitionError::invalid_input(format!("RGBA buffer does not match {width}x{height}"))
        })?;
        Self::try_from(image)
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgba(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgba(img) => img.height(),
        }
    }

    /// Grayscale view used for every ink decision.
    pub fn to_luma(&self) -> GrayImage {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Rgba(img) => GrayImage::from_fn(img.width(), img.height(), |x, y| {
                let [r, g, b, a] = img.get_pixel(x, y).0;
                if a == 0 {
                    Luma([BACKGROUND_LUMA])
                } else {
                    Luma([luminance(r, g, b)])
                }
            }),
        }
    }

    pub(crate) fn crop(&self, bounds: InkBounds) -> InkRaster {
        match self {
            Self::Gray(img) => Self::Gray(
                imageops::crop_imm(img, bounds.left, bounds.top, bounds.width, bounds.height)
                    .to_image(),
            ),
            Self::Rgba(img) => Self::Rgba(
                imageops::crop_imm(img, bounds.left, bounds.top, bounds.width, bounds.height)
                    .to_image(),
            ),
        }
    }
}

fn ensure_non_empty(width: u32, height: u32) -> Result<(), RecognitionError> {
    if width == 0 || height == 0 {
        return Err(RecognitionError::invalid_input(format!(
            "ink raster must be at least 1x1, got {width}x{height}"
        )));
    }
    Ok(())
}

impl TryFrom<GrayImage> for InkRaster {
    type Error = RecognitionError;

    fn try_from(image: GrayImage) -> Result<Self, Self::Error> {
        ensure_non_empty(image.width(), image.height())?;
        Ok(Self::Gray(image))
    }
}

impl TryFrom<RgbaImage> for InkRaster {
    type Error = RecognitionError;

    fn try_from(image: RgbaImage) -> Result<Self, Self::Error> {
        ensure_non_empty(image.width(), image.height())?;
        Ok(Self::Rgba(image))
    }
}

impl TryFrom<DynamicImage> for InkRaster {
    type Error = RecognitionError;

    fn try_from(image: DynamicImage) -> Result<Self, Self::Error> {
        match image {
            DynamicImage::ImageLuma8(gray) => Self::try_from(gray),
            other => Self::try_from(other.into_rgba8()),
        }
    }
}

/// Rec. 601 luma, rounded to the nearest grey level.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Axis-aligned pixel rectangle, `left..left + width` by `top..top + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkBounds {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl InkBounds {
    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// Tight bounding box of every pixel darker than `threshold`.
pub fn ink_bounds(luma: &GrayImage, threshold: u8) -> Option<InkBounds> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, px) in luma.enumerate_pixels() {
        if px.0[0] < threshold {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| InkBounds {
        left: min_x,
        top: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Aspect-preserving resize so the height equals `target_height`.
pub(crate) fn resize_to_height(image: &GrayImage, target_height: u32) -> GrayImage {
    let width = scaled_width(image.width(), image.height(), target_height);
    if width == image.width() && target_height == image.height() {
        return image.clone();
    }
    imageops::resize(image, width, target_height, FilterType::Triangle)
}

pub(crate) fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    let scaled = (width as f64 * target_height as f64 / height as f64).round();
    (scaled as u32).max(1)
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{GrayImage, Luma};

    use super::InkRaster;

    /// White raster with black filled rectangles `(left, top, width, height)`.
    pub(crate) fn raster_with_blobs(
        width: u32,
        height: u32,
        blobs: &[(u32, u32, u32, u32)],
    ) -> InkRaster {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for &(left, top, w, h) in blobs {
            for y in top..top + h {
                for x in left..left + w {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        InkRaster::Gray(img)
    }
}
