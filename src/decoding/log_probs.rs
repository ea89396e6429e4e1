use candle_core::{DType, Tensor};

use crate::error::RecognitionError;

/// Accepted layouts of the recognition model's output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[T, 1, V]`, sequence-major with a unit batch.
    T1V,
    /// `[1, T, V]`, batch-major with a unit batch.
    OneTV,
    /// `[T, V]`.
    TV,
}

impl OutputLayout {
    /// Resolve the layout and `(T, V)` from raw dims.
    pub fn detect(dims: &[usize]) -> Result<(Self, usize, usize), RecognitionError> {
        let resolved = match *dims {
            [t, 1, v] => (Self::T1V, t, v),
            [1, t, v] => (Self::OneTV, t, v),
            [t, v] => (Self::TV, t, v),
            _ => return Err(RecognitionError::unexpected_shape(dims)),
        };
        if resolved.1 == 0 || resolved.2 == 0 {
            return Err(RecognitionError::unexpected_shape(dims));
        }
        Ok(resolved)
    }
}

/// Non-empty `T x V` matrix of per-timestep log-probabilities, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LogProbMatrix {
    num_frames: usize,
    num_classes: usize,
    data: Vec<f32>,
}

impl LogProbMatrix {
    pub fn new(
        num_frames: usize,
        num_classes: usize,
        data: Vec<f32>,
    ) -> Result<Self, RecognitionError> {
        if num_frames == 0 || num_classes == 0 {
            return Err(RecognitionError::invalid_input(format!(
                "log-prob matrix must be non-empty, got {num_frames}x{num_classes}"
            )));
        }
        let expected_len = num_frames
            .checked_mul(num_classes)
            .ok_or_else(|| RecognitionError::invalid_input("log-prob matrix is too large"))?;
        if expected_len != data.len() {
            return Err(RecognitionError::invalid_input(format!(
                "log-prob shape/data mismatch: shape implies {expected_len} values, got {}",
                data.len()
            )));
        }
        Ok(Self {
            num_frames,
            num_classes,
            data,
        })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, RecognitionError> {
        let num_classes = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != num_classes) {
            return Err(RecognitionError::invalid_input(
                "log-prob rows have different lengths",
            ));
        }
        Self::new(rows.len(), num_classes, rows.concat())
    }

    /// Build from a flat host buffer with model-output dims.
    pub fn from_raw(dims: &[usize], data: Vec<f32>) -> Result<Self, RecognitionError> {
        let (_, num_frames, num_classes) = OutputLayout::detect(dims)?;
        // Every accepted layout has a unit batch axis, so the flat order is
        // already time-major.
        Self::new(num_frames, num_classes, data)
    }

    pub fn from_tensor(tensor: &Tensor) -> Result<Self, RecognitionError> {
        let dims = tensor.dims();
        let (layout, num_frames, num_classes) = OutputLayout::detect(dims)?;
        let rows = match layout {
            OutputLayout::T1V => tensor.squeeze(1),
            OutputLayout::OneTV => tensor.squeeze(0),
            OutputLayout::TV => Ok(tensor.clone()),
        }
        .and_then(|t| t.to_dtype(DType::F32))
        .map_err(|e| RecognitionError::runtime("log_probs layout", e))?;
        let data = rows
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| RecognitionError::runtime("log_probs to_vec1", e))?;
        Self::new(num_frames, num_classes, data)
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn row(&self, t: usize) -> &[f32] {
        let start = t * self.num_classes;
        &self.data[start..start + self.num_classes]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.num_classes)
    }

    /// Keep the first `min(max_frames, T)` rows, never fewer than one.
    pub fn truncated(&self, max_frames: usize) -> Self {
        let num_frames = max_frames.clamp(1, self.num_frames);
        Self {
            num_frames,
            num_classes: self.num_classes,
            data: self.data[..num_frames * self.num_classes].to_vec(),
        }
    }
}
