use candle_core::{Device, D};

use crate::config::RecognizerConfig;
use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::ranking::to_percents;
use crate::decoding::vocab::Vocabulary;
use crate::error::RecognitionError;
use crate::pipeline::traits::{CandidateDecoder, InferenceBackend};
use crate::raster::preprocess::{preprocess_raster, PreprocessResult};
use crate::raster::segment::{estimate_char_cut_points, split_to_characters};
use crate::raster::InkRaster;
use crate::types::Candidate;

pub struct HandwritingRecognizer {
    backend: Box<dyn InferenceBackend>,
    decoder: Box<dyn CandidateDecoder>,
    vocab: Vocabulary,
    device: Device,
    config: RecognizerConfig,
}

pub(crate) struct HandwritingRecognizerParts {
    pub backend: Box<dyn InferenceBackend>,
    pub decoder: Box<dyn CandidateDecoder>,
    pub vocab: Vocabulary,
    pub device: Device,
    pub config: RecognizerConfig,
}

impl HandwritingRecognizer {
    pub(crate) fn from_parts(parts: HandwritingRecognizerParts) -> Self {
        Self {
            backend: parts.backend,
            decoder: parts.decoder,
            vocab: parts.vocab,
            device: parts.device,
            config: parts.config,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn device_label(&self) -> String {
        self.backend.device_label()
    }

    /// Ranked candidates for a raster holding one piece of text.
    ///
    /// Fails with [`RecognitionError::EmptyInk`] when nothing is drawn. A
    /// degenerate beam yields an empty list.
    pub fn recognize(&self, raster: &InkRaster) -> Result<Vec<Candidate>, RecognitionError> {
        let prepared = preprocess_raster(raster, &self.config.preprocess)?;
        let mut log_probs = self.infer_log_probs(&prepared)?;
        if self.config.trim_to_valid_time_steps {
            log_probs = log_probs.truncated(prepared.valid_time_steps);
        }

        match self.decoder.decode(&log_probs, &self.vocab) {
            Ok(hypotheses) => Ok(to_percents(&hypotheses)),
            Err(RecognitionError::DegenerateBeam) => {
                tracing::warn!(
                    frames = log_probs.num_frames(),
                    "decoder produced no hypotheses; returning no candidates"
                );
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Split the raster into characters and recognize each one in order.
    ///
    /// Segments that lose all ink after cropping are skipped.
    pub fn recognize_characters(
        &self,
        raster: &InkRaster,
    ) -> Result<Vec<Vec<Candidate>>, RecognitionError> {
        let segments = split_to_characters(raster, &self.config.segmentation);
        let mut results = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            match self.recognize(segment) {
                Ok(candidates) => results.push(candidates),
                Err(RecognitionError::EmptyInk) => {
                    tracing::debug!(index, "segment has no ink; skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    /// Guide-line x positions between characters in `raster`.
    pub fn cut_points(&self, raster: &InkRaster) -> Vec<u32> {
        estimate_char_cut_points(raster, &self.config.segmentation)
    }

    /// Run the backend on a prepared input and read its output matrix.
    pub fn infer_log_probs(
        &self,
        prepared: &PreprocessResult,
    ) -> Result<LogProbMatrix, RecognitionError> {
        let input = prepared.to_tensor(&self.device)?;
        let mut output = self.backend.infer(&input)?;
        if self.config.apply_log_softmax {
            output = candle_nn::ops::log_softmax(&output, D::Minus1)
                .map_err(|e| RecognitionError::runtime("log_softmax", e))?;
        }
        LogProbMatrix::from_tensor(&output).inspect_err(|err| {
            if let RecognitionError::UnexpectedOutputShape { dims } = err {
                tracing::error!(?dims, "recognition model violated its output contract");
            }
        })
    }
}
