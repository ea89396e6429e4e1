use crate::config::{BeamSearchConfig, DecodeMethod};
use crate::decoding::beam::beam_search_top_k;
use crate::decoding::greedy::greedy_decode_matrix;
use crate::decoding::log_probs::LogProbMatrix;
use crate::decoding::single_char::{score_all_single_chars, top_k_from_scores};
use crate::decoding::vocab::Vocabulary;
use crate::error::RecognitionError;
use crate::pipeline::traits::CandidateDecoder;
use crate::types::Hypothesis;

pub struct GreedyCandidateDecoder;

impl CandidateDecoder for GreedyCandidateDecoder {
    fn decode(
        &self,
        log_probs: &LogProbMatrix,
        vocab: &Vocabulary,
    ) -> Result<Vec<Hypothesis>, RecognitionError> {
        Ok(vec![greedy_decode_matrix(log_probs, vocab)])
    }
}

pub struct BeamCandidateDecoder {
    pub config: BeamSearchConfig,
}

impl CandidateDecoder for BeamCandidateDecoder {
    fn decode(
        &self,
        log_probs: &LogProbMatrix,
        vocab: &Vocabulary,
    ) -> Result<Vec<Hypothesis>, RecognitionError> {
        beam_search_top_k(log_probs, vocab, &self.config)
    }
}

/// Treats the whole window as exactly one character.
pub struct SingleCharCandidateDecoder {
    pub top_k: usize,
    pub blank_id: usize,
}

impl CandidateDecoder for SingleCharCandidateDecoder {
    fn decode(
        &self,
        log_probs: &LogProbMatrix,
        vocab: &Vocabulary,
    ) -> Result<Vec<Hypothesis>, RecognitionError> {
        let scores = score_all_single_chars(log_probs, self.blank_id);
        Ok(top_k_from_scores(&scores, self.top_k, self.blank_id)
            .into_iter()
            .filter_map(|(id, score)| {
                let label = vocab.char_of(id);
                (!label.is_empty()).then(|| Hypothesis::new(label, score))
            })
            .collect())
    }
}

pub fn decoder_for(method: DecodeMethod, beam: &BeamSearchConfig) -> Box<dyn CandidateDecoder> {
    match method {
        DecodeMethod::Greedy => Box::new(GreedyCandidateDecoder),
        DecodeMethod::Beam => Box::new(BeamCandidateDecoder {
            config: beam.clone(),
        }),
        DecodeMethod::SingleChar => Box::new(SingleCharCandidateDecoder {
            top_k: beam.top_k,
            blank_id: beam.blank_id,
        }),
    }
}
