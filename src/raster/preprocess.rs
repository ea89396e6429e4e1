use candle_core::{Device, Tensor};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::config::{PasteMode, PreprocessConfig};
use crate::error::RecognitionError;
use crate::raster::{ink_bounds, resize_to_height, InkRaster, BACKGROUND_LUMA};

/// Canvas columns per model output timestep.
///
/// Coupled to the temporal downsampling of the recognition model this crate
/// is paired with. Re-verify it whenever the model changes.
pub const MODEL_TIME_STRIDE: u32 = 2;

/// Normalized model input, logically shaped `[1, 1, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessResult {
    pub height: u32,
    pub width: u32,
    /// Row-major values in [0, 1]; 1.0 is background, 0.0 is full ink.
    pub data: Vec<f32>,
    /// Output timesteps covering the inked part of the canvas.
    pub valid_time_steps: usize,
}

impl PreprocessResult {
    pub fn shape(&self) -> [usize; 4] {
        [1, 1, self.height as usize, self.width as usize]
    }

    pub fn pixel(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn to_tensor(&self, device: &Device) -> Result<Tensor, RecognitionError> {
        let [batch, channels, height, width] = self.shape();
        Tensor::from_vec(self.data.clone(), (batch, channels, height, width), device)
            .map_err(|e| RecognitionError::runtime("input tensor creation", e))
    }
}

/// Crop the ink, scale it to the model height and paste it onto a fixed
/// white canvas.
pub fn preprocess_raster(
    raster: &InkRaster,
    config: &PreprocessConfig,
) -> Result<PreprocessResult, RecognitionError> {
    config.validate()?;

    let luma = raster.to_luma();
    let bounds = ink_bounds(&luma, config.ink_threshold).ok_or(RecognitionError::EmptyInk)?;
    let crop = imageops::crop_imm(&luma, bounds.left, bounds.top, bounds.width, bounds.height)
        .to_image();
    drop(luma);

    let mut scaled = resize_to_height(&crop, config.target_height);
    drop(crop);

    let max_paste_width = config.max_width - 2 * config.min_paste_margin_px;
    if scaled.width() > max_paste_width || scaled.height() > config.target_height {
        let width = scaled.width().min(max_paste_width);
        let height = scaled.height().min(config.target_height);
        scaled = imageops::resize(&scaled, width, height, FilterType::Triangle);
    }

    let (paste_width, paste_height) = scaled.dimensions();
    let x_offset = match config.paste_mode {
        PasteMode::Left => config.min_paste_margin_px,
        PasteMode::Center => (config.max_width - paste_width) / 2,
    }
    .min(config.max_width - paste_width);
    let y_offset = (config.target_height - paste_height) / 2;

    let mut canvas = GrayImage::from_pixel(
        config.max_width,
        config.target_height,
        Luma([BACKGROUND_LUMA]),
    );
    imageops::replace(&mut canvas, &scaled, x_offset as i64, y_offset as i64);
    drop(scaled);

    // Resampling can lighten a tiny crop past the threshold; fall back to the
    // pasted extent so the hint still covers the glyph.
    let last_ink_column = last_ink_column(&canvas, config.ink_threshold)
        .unwrap_or(x_offset + paste_width - 1);
    let valid_time_steps = ((last_ink_column + 1) / MODEL_TIME_STRIDE).max(1) as usize;

    tracing::debug!(
        bbox_left = bounds.left,
        bbox_top = bounds.top,
        bbox_width = bounds.width,
        bbox_height = bounds.height,
        paste_width,
        x_offset,
        last_ink_column,
        valid_time_steps,
        "preprocess: normalized ink raster"
    );

    let data = canvas
        .pixels()
        .map(|px| px.0[0] as f32 / BACKGROUND_LUMA as f32)
        .collect();

    Ok(PreprocessResult {
        height: config.target_height,
        width: config.max_width,
        data,
        valid_time_steps,
    })
}

fn last_ink_column(canvas: &GrayImage, threshold: u8) -> Option<u32> {
    (0..canvas.width())
        .rev()
        .find(|&x| (0..canvas.height()).any(|y| canvas.get_pixel(x, y).0[0] < threshold))
}
