mod annotation;
mod answer;
mod document;
mod document_set;
mod query;

pub use annotation::{Annotation, AnnotationData, AnnotationKind, PredicateLink, Span};
pub use answer::{AnswerResult, ExtractionFailure};
pub use document::Document;
pub use document_set::DocumentSet;
pub use query::Query;
