use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::RecognitionError;

/// Model id <-> character table. Id 0 is the CTC blank and maps to "".
#[derive(Debug, Clone)]
pub struct Vocabulary {
    itos: Vec<String>,
    stoi: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct VocabularyFile {
    itos: Vec<String>,
}

impl Vocabulary {
    pub const BLANK_ID: usize = 0;

    pub fn from_itos(itos: Vec<String>) -> Self {
        let mut stoi = HashMap::with_capacity(itos.len());
        for (idx, s) in itos.iter().enumerate() {
            // First occurrence wins for duplicated entries.
            stoi.entry(s.clone()).or_insert(idx + 1);
        }
        Self { itos, stoi }
    }

    pub fn from_json_str(data: &str) -> Result<Self, RecognitionError> {
        let raw: VocabularyFile = serde_json::from_str(data)
            .map_err(|e| RecognitionError::json("parse vocabulary", e))?;
        Ok(Self::from_itos(raw.itos))
    }

    pub fn load(path: &Path) -> Result<Self, RecognitionError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| RecognitionError::io("read vocabulary", e))?;
        Self::from_json_str(&data)
    }

    /// Text for a model id: "" for the blank and for ids past the table.
    pub fn char_of(&self, id: usize) -> &str {
        match id {
            Self::BLANK_ID => "",
            _ => self.itos.get(id - 1).map(String::as_str).unwrap_or(""),
        }
    }

    pub fn id_of(&self, s: &str) -> Option<usize> {
        self.stoi.get(s).copied()
    }

    /// Number of model classes, blank included.
    pub fn num_classes(&self) -> usize {
        self.itos.len() + 1
    }

    pub fn itos(&self) -> &[String] {
        &self.itos
    }
}
