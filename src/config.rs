use std::path::Path;

use serde::Deserialize;

use crate::decoding::vocab::Vocabulary;
use crate::error::RecognitionError;

/// Horizontal placement of the normalized crop on the model canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasteMode {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub target_height: u32,
    pub max_width: u32,
    /// Grayscale value below which a pixel counts as ink.
    pub ink_threshold: u8,
    pub paste_mode: PasteMode,
    pub min_paste_margin_px: u32,
}

impl PreprocessConfig {
    pub const DEFAULT_TARGET_HEIGHT: u32 = 32;
    pub const DEFAULT_MAX_WIDTH: u32 = 512;
    pub const DEFAULT_INK_THRESHOLD: u8 = 245;

    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.target_height == 0 || self.max_width == 0 {
            return Err(RecognitionError::invalid_input(format!(
                "canvas must be at least 1x1, got {}x{}",
                self.max_width, self.target_height
            )));
        }
        if self.min_paste_margin_px.saturating_mul(2) >= self.max_width {
            return Err(RecognitionError::invalid_input(format!(
                "paste margin {} leaves no room on a {}px wide canvas",
                self.min_paste_margin_px, self.max_width
            )));
        }
        Ok(())
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_height: Self::DEFAULT_TARGET_HEIGHT,
            max_width: Self::DEFAULT_MAX_WIDTH,
            ink_threshold: Self::DEFAULT_INK_THRESHOLD,
            paste_mode: PasteMode::Left,
            min_paste_margin_px: 0,
        }
    }
}

/// Column-projection segmentation parameters. Pixel quantities are measured at
/// `seg_target_height`, except `out_pad_px` which applies to the source crop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub ink_threshold: u8,
    pub seg_target_height: u32,
    pub min_ink_pixels_per_column: u32,
    pub min_gap_px: u32,
    pub min_segment_width_px: u32,
    pub thin_segment_width_px: u32,
    pub merge_gap_px: u32,
    pub out_pad_px: u32,
    pub max_chars: usize,
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.seg_target_height == 0 {
            return Err(RecognitionError::invalid_input(
                "seg_target_height must be >= 1",
            ));
        }
        if self.max_chars == 0 {
            return Err(RecognitionError::invalid_input("max_chars must be >= 1"));
        }
        Ok(())
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            ink_threshold: PreprocessConfig::DEFAULT_INK_THRESHOLD,
            seg_target_height: 24,
            min_ink_pixels_per_column: 1,
            min_gap_px: 2,
            min_segment_width_px: 2,
            thin_segment_width_px: 3,
            merge_gap_px: 3,
            out_pad_px: 2,
            max_chars: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BeamSearchConfig {
    pub beam_width: usize,
    /// Candidate ids considered per timestep; exact search would use all V.
    pub per_step_top: usize,
    pub top_k: usize,
    pub blank_id: usize,
}

impl BeamSearchConfig {
    /// Widths must be positive. The blank must be column 0, which is where
    /// [`Vocabulary`](crate::decoding::vocab::Vocabulary) places it.
    pub fn validate(&self) -> Result<(), RecognitionError> {
        if self.beam_width == 0 || self.per_step_top == 0 || self.top_k == 0 {
            return Err(RecognitionError::invalid_input(format!(
                "beam_width, per_step_top and top_k must be >= 1, got {}, {}, {}",
                self.beam_width, self.per_step_top, self.top_k
            )));
        }
        if self.blank_id != Vocabulary::BLANK_ID {
            return Err(RecognitionError::invalid_input(format!(
                "blank_id must be {}, got {}",
                Vocabulary::BLANK_ID,
                self.blank_id
            )));
        }
        Ok(())
    }
}

impl Default for BeamSearchConfig {
    fn default() -> Self {
        Self {
            beam_width: 16,
            per_step_top: 8,
            top_k: 5,
            blank_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMethod {
    Greedy,
    #[default]
    Beam,
    SingleChar,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub vocab_path: String,
    pub device: String,
    pub decode_method: DecodeMethod,
    /// Set when the backend emits raw logits instead of log-probabilities.
    pub apply_log_softmax: bool,
    pub trim_to_valid_time_steps: bool,
    pub preprocess: PreprocessConfig,
    pub segmentation: SegmentationConfig,
    pub beam: BeamSearchConfig,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            vocab_path: String::new(),
            device: "cpu".to_string(),
            decode_method: DecodeMethod::Beam,
            apply_log_softmax: false,
            trim_to_valid_time_steps: true,
            preprocess: PreprocessConfig::default(),
            segmentation: SegmentationConfig::default(),
            beam: BeamSearchConfig::default(),
        }
    }
}

impl RecognizerConfig {
    pub fn load(path: &Path) -> Result<Self, RecognitionError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| RecognitionError::io("read recognizer config", e))?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, RecognitionError> {
        let config: Self = serde_json::from_str(data)
            .map_err(|e| RecognitionError::json("parse recognizer config", e))?;
        config.preprocess.validate()?;
        config.segmentation.validate()?;
        config.beam.validate()?;
        Ok(config)
    }
}
