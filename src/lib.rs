//! Question answering over a passage index.
//!
//! A question is annotated with semantic roles, turned into a phrase query,
//! matched against indexed passages, and answered from each passage by an
//! extractive model. Every step is a [`pipeline::Stage`]; runs can stop at a
//! named stage and be resumed later.
//!
//! # Examples
//!
//! ```
//! use qapipe::{Annotation, AnnotationKind, Document, DocumentSet, Query};
//!
//! let mut question = Document::new("Who wrote Hamlet?");
//! question.add_annotation(Annotation::token(0, 3, None, None)).unwrap();
//! assert!(question.has_kind(AnnotationKind::Token));
//!
//! let query = Query::new("hamlet wrote", "content", 10, 1000).unwrap();
//! question.attach_query(query);
//!
//! let set = DocumentSet::boxed("query", question);
//! assert_eq!(set.len(), 1);
//! ```

pub mod answerer;
pub mod backend;
pub mod capability;
pub mod config;
pub mod error;
pub mod lexicon;
pub mod models;
pub mod pipeline;
pub mod stages;

pub use answerer::{LlmExtractor, LlmExtractorBuilder};
pub use backend::{
    BackendError, ElasticClient, ElasticClientBuilder, OllamaClient, OllamaClientBuilder,
    RetryPolicy, SrlClient, SrlClientBuilder,
};
pub use capability::{
    AnnotationCapability, CapabilityKind, ExtractedAnswer, QaCapability, SearchCapability,
    SearchHit,
};
pub use config::Settings;
pub use error::{
    AnnotationError, ConfigurationError, ExtractionError, PipelineError, RetrievalError,
    StageError, UnitFailure,
};
pub use models::{
    Annotation, AnnotationKind, AnswerResult, Document, DocumentSet, ExtractionFailure, Query,
    Span,
};
pub use pipeline::{
    DocumentSource, FailurePolicy, LineReader, Pipeline, PipelineBuilder, PipelineRun, Stage, TextReader,
    Unit,
};
