//! Error types shared by the pipeline, its stages, and the capability backends.

use thiserror::Error;

use crate::backend::BackendError;
use crate::models::AnnotationKind;

/// Invalid or missing configuration.
///
/// Always fatal: a run that hits one of these stops instead of moving on to
/// the next unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("configuration key `{key}` must not be empty")]
    EmptyKey { key: &'static str },

    #[error("query size must be greater than zero")]
    ZeroSize,

    #[error("document set `{set}` has no member `{key}`")]
    MissingMember { set: String, key: String },

    #[error("document set already has a member named `{0}`")]
    DuplicateMember(String),

    #[error("pipeline has no stage named `{0}`")]
    UnknownStage(String),

    #[error("pipeline already has a stage named `{0}`")]
    DuplicateStage(String),

    #[error("checkpoint `{checkpoint}` does not come after `{after}`")]
    CheckpointOrder { checkpoint: String, after: String },

    #[error("pipeline has no document source")]
    MissingReader,

    #[error("pipeline failure policy must be set explicitly")]
    MissingFailurePolicy,

    #[error("stage `{stage}` expects a {expected}, got a {found}")]
    UnexpectedUnit {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures while attaching or reading linguistic annotations.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("span {begin}..{end} is outside of text with length {len}")]
    SpanOutOfBounds { begin: usize, end: usize, len: usize },

    #[error("span {begin}..{end} does not fall on character boundaries")]
    SpanNotOnCharBoundary { begin: usize, end: usize },

    #[error("{kind} reference {index} does not exist")]
    DanglingReference { kind: AnnotationKind, index: usize },

    #[error("{found} annotation stored under {expected}")]
    MisfiledAnnotation {
        expected: AnnotationKind,
        found: AnnotationKind,
    },

    #[error("document carries no {0} annotations")]
    MissingKind(AnnotationKind),

    #[error("could not align word `{word}` with the document text")]
    Alignment { word: String },

    #[error("annotation capability failed: {0}")]
    Capability(#[source] BackendError),
}

/// Failures that stop retrieval for a single unit.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("document set `{set}` has no query member `{key}`")]
    MissingQueryMember { set: String, key: String },

    #[error("member `{key}` carries no query")]
    MissingQuery { key: String },

    #[error("search failed: {0}")]
    Search(#[source] BackendError),

    #[error("retrieved passage clashes with existing member `{0}`")]
    DuplicateMember(String),

    #[error("could not add retrieved passage: {0}")]
    Member(#[source] ConfigurationError),
}

/// Answer extraction failure for one member of a document set.
///
/// Recorded against the member key; the rest of the set is still processed.
#[derive(Debug, Error)]
#[error("answer extraction failed for `{key}`: {source}")]
pub struct ExtractionError {
    pub key: String,
    #[source]
    pub source: BackendError,
}

/// Everything a stage can fail with while processing one unit.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("{capability} capability failed to initialize: {source}")]
    Initialization {
        capability: crate::capability::CapabilityKind,
        #[source]
        source: BackendError,
    },
}

impl StageError {
    /// Returns true if the error must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StageError::Configuration(_) | StageError::Initialization { .. }
        )
    }
}

/// A unit that could not be processed, with enough context to diagnose it.
#[derive(Debug, Error)]
#[error("unit {unit} failed at stage `{stage}`: {source}")]
pub struct UnitFailure {
    /// Zero-based position of the unit in the input sequence.
    pub unit: usize,
    /// Name of the stage that failed.
    pub stage: String,
    #[source]
    pub source: StageError,
}

/// Errors raised before a run produces any unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("stage `{stage}` failed to initialize: {source}")]
    Initialization {
        stage: String,
        #[source]
        source: StageError,
    },
}
