use serde::Serialize;

/// Decoder output before ranking: text with its total log-probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub text: String,
    pub log_score: f32,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>, log_score: f32) -> Self {
        Self {
            text: text.into(),
            log_score,
        }
    }
}

/// Ranked recognition result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub text: String,
    /// Share of this candidate within its returned set, in [0, 100].
    /// Relative confidence only, not a calibrated model probability.
    pub percent: f64,
}
