use std::path::Path;

use candle_core::Device;

use crate::config::RecognizerConfig;
use crate::decoding::vocab::Vocabulary;
use crate::error::RecognitionError;
use crate::pipeline::defaults::decoder_for;
use crate::pipeline::runtime::{HandwritingRecognizer, HandwritingRecognizerParts};
use crate::pipeline::traits::{CandidateDecoder, InferenceBackend};

pub struct RecognizerBuilder {
    config: RecognizerConfig,
    backend: Option<Box<dyn InferenceBackend>>,
    vocabulary: Option<Vocabulary>,
    decoder: Option<Box<dyn CandidateDecoder>>,
}

impl RecognizerBuilder {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            backend: None,
            vocabulary: None,
            decoder: None,
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use an in-memory vocabulary instead of loading `config.vocab_path`.
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn CandidateDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<HandwritingRecognizer, RecognitionError> {
        self.config.preprocess.validate()?;
        self.config.segmentation.validate()?;
        self.config.beam.validate()?;

        let vocab = match self.vocabulary {
            Some(vocab) => vocab,
            None => Vocabulary::load(Path::new(&self.config.vocab_path))?,
        };
        let backend = self.backend.ok_or_else(|| {
            RecognitionError::runtime("build recognizer", "no inference backend configured")
        })?;
        let device = match self.config.device.as_str() {
            "cuda" => Device::new_cuda(0).map_err(|e| RecognitionError::runtime("CUDA init", e))?,
            _ => Device::Cpu,
        };
        let decoder = self
            .decoder
            .unwrap_or_else(|| decoder_for(self.config.decode_method, &self.config.beam));

        tracing::info!(
            classes = vocab.num_classes(),
            backend_device = %backend.device_label(),
            decode_method = ?self.config.decode_method,
            canvas_width = self.config.preprocess.max_width,
            canvas_height = self.config.preprocess.target_height,
            "handwriting recognizer ready"
        );

        Ok(HandwritingRecognizer::from_parts(HandwritingRecognizerParts {
            backend,
            decoder,
            vocab,
            device,
            config: self.config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Tensor;

    use super::*;
    use crate::config::DecodeMethod;

    struct EchoBackend;

    impl InferenceBackend for EchoBackend {
        fn infer(&self, input: &Tensor) -> Result<Tensor, RecognitionError> {
            Tensor::zeros((4, 3), candle_core::DType::F32, input.device())
                .map_err(|e| RecognitionError::runtime("mock infer", e))
        }

        fn device_label(&self) -> String {
            "mock".to_string()
        }
    }

    #[test]
    fn build_fails_without_backend() {
        let result = RecognizerBuilder::new(RecognizerConfig::default())
            .with_vocabulary(Vocabulary::from_itos(vec!["A".into()]))
            .build();
        let err = result.err().expect("backend is required");
        assert!(err.to_string().contains("no inference backend"));
    }

    #[test]
    fn build_fails_on_missing_vocab_file() {
        let config = RecognizerConfig {
            vocab_path: "/nonexistent/vocab.json".to_string(),
            ..RecognizerConfig::default()
        };
        let result = RecognizerBuilder::new(config)
            .with_backend(Box::new(EchoBackend))
            .build();
        assert!(matches!(result, Err(RecognitionError::Io { .. })));
    }

    #[test]
    fn build_loads_vocab_from_config_path() {
        let vocab_path = std::env::temp_dir().join("ink_ctc_rs_builder_vocab.json");
        std::fs::write(&vocab_path, r#"{"itos": ["A", "B"]}"#).expect("write vocab");
        let config = RecognizerConfig {
            vocab_path: vocab_path.to_string_lossy().to_string(),
            decode_method: DecodeMethod::Greedy,
            ..RecognizerConfig::default()
        };
        let recognizer = RecognizerBuilder::new(config)
            .with_backend(Box::new(EchoBackend))
            .build()
            .expect("build should succeed");
        assert_eq!(recognizer.vocabulary().num_classes(), 3);
        assert_eq!(recognizer.device_label(), "mock");
        let _ = std::fs::remove_file(&vocab_path);
    }

    #[test]
    fn build_rejects_invalid_preprocess_config() {
        let mut config = RecognizerConfig::default();
        config.preprocess.max_width = 0;
        let result = RecognizerBuilder::new(config)
            .with_backend(Box::new(EchoBackend))
            .with_vocabulary(Vocabulary::from_itos(vec!["A".into()]))
            .build();
        assert!(matches!(result, Err(RecognitionError::InvalidInput { .. })));
    }
}
