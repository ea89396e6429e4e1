use candle_core::Tensor;

use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::vocab::Vocabulary;
use crate::error::RecognitionError;
use crate::types::Hypothesis;

/// The recognition model, seen only through its tensor contract.
///
/// Input is `[1, 1, H, W]` f32 in [0, 1]. Output must be `[T, 1, V]`,
/// `[1, T, V]` or `[T, V]` log-probabilities (or logits when the recognizer
/// is configured to apply log-softmax itself). Calls are blocking.
pub trait InferenceBackend: Send + Sync {
    fn infer(&self, input: &Tensor) -> Result<Tensor, RecognitionError>;

    fn device_label(&self) -> String;
}

pub trait CandidateDecoder: Send + Sync {
    /// Hypotheses best first. May fail with
    /// [`RecognitionError::DegenerateBeam`] when nothing survives.
    fn decode(
        &self,
        log_probs: &LogProbMatrix,
        vocab: &Vocabulary,
    ) -> Result<Vec<Hypothesis>, RecognitionError>;
}
