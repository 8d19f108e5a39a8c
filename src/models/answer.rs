use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// An answer span extracted from one member of a document set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Key of the member the answer was drawn from.
    pub source_key: String,
    pub answer_text: String,
    pub score: f64,
}

impl AnswerResult {
    pub fn new(source_key: impl Into<String>, answer_text: impl Into<String>, score: f64) -> Self {
        Self {
            source_key: source_key.into(),
            answer_text: answer_text.into(),
            score,
        }
    }
}

/// Failed extraction recorded against a member key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub key: String,
    pub reason: String,
}

impl From<&ExtractionError> for ExtractionFailure {
    fn from(error: &ExtractionError) -> Self {
        Self {
            key: error.key.clone(),
            reason: error.source.to_string(),
        }
    }
}
