//! Interfaces to the external models and services the pipeline depends on.
//!
//! Capability handles are constructed once, shared between stages behind an
//! `Arc`, and only ever called through `&self`. Retries and timeouts belong to
//! the implementations, not to the stages calling them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::error::AnnotationError;
use crate::models::{AnnotationKind, Document, Query};

/// The kind of external capability a stage depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Annotation,
    Search,
    QuestionAnswering,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annotation => write!(f, "annotation"),
            Self::Search => write!(f, "search"),
            Self::QuestionAnswering => write!(f, "question answering"),
        }
    }
}

/// One passage returned by a search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f64,
}

impl SearchHit {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// An answer span chosen by an extractive QA model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedAnswer {
    pub answer_text: String,
    pub score: f64,
}

impl ExtractedAnswer {
    pub fn new(answer_text: impl Into<String>, score: f64) -> Self {
        Self {
            answer_text: answer_text.into(),
            score,
        }
    }
}

/// Tokenizer, tagger and semantic role labeler.
pub trait AnnotationCapability: Send + Sync {
    /// Prepares the backend; called once before the first `annotate`.
    fn init(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Releases backend resources.
    fn close(&self) {}

    /// Returns `doc` with annotations of the requested kinds appended.
    fn annotate(
        &self,
        doc: Document,
        kinds: &BTreeSet<AnnotationKind>,
    ) -> Result<Document, AnnotationError>;
}

/// Passage search over an indexed collection.
pub trait SearchCapability: Send + Sync {
    fn init(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn close(&self) {}

    /// Returns matching passages, best first.
    fn find(&self, query: &Query) -> Result<Vec<SearchHit>, BackendError>;
}

/// Extractive question answering.
pub trait QaCapability: Send + Sync {
    fn init(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn close(&self) {}

    /// Picks the span of `context` that best answers `question`.
    fn answer(&self, question: &str, context: &str) -> Result<ExtractedAnswer, BackendError>;
}
