use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Nothing darker than the ink threshold was found. Callers should ask for
    /// more input rather than treat this as a failure.
    #[error("no ink pixels found in raster")]
    EmptyInk,
    #[error("unexpected model output shape {dims:?}; expected [T, 1, V], [1, T, V] or [T, V]")]
    UnexpectedOutputShape { dims: Vec<usize> },
    #[error("beam search produced no surviving prefixes")]
    DegenerateBeam,
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RecognitionError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn unexpected_shape(dims: &[usize]) -> Self {
        Self::UnexpectedOutputShape {
            dims: dims.to_vec(),
        }
    }

    /// True for errors a caller can recover from by collecting more input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyInk | Self::DegenerateBeam)
    }
}
