pub mod config;
pub mod decoding;
pub mod error;
pub mod pipeline;
pub mod raster;
pub mod types;

pub use config::{
    BeamSearchConfig, DecodeMethod, PasteMode, PreprocessConfig, RecognizerConfig,
    SegmentationConfig,
};
pub use decoding::beam::beam_search_top_k;
pub use decoding::greedy::{greedy_decode, greedy_decode_matrix};
pub use decoding::log_probs::{LogProbMatrix, OutputLayout};
pub use decoding::ranking::to_percents;
pub use decoding::single_char::{score_all_single_chars, top_k_from_scores};
pub use decoding::vocab::Vocabulary;
pub use error::RecognitionError;
pub use pipeline::builder::RecognizerBuilder;
pub use pipeline::runtime::HandwritingRecognizer;
pub use pipeline::traits::{CandidateDecoder, InferenceBackend};
pub use raster::preprocess::{preprocess_raster, PreprocessResult};
pub use raster::segment::{estimate_char_cut_points, split_to_characters};
pub use raster::InkRaster;
pub use types::{Candidate, Hypothesis};
