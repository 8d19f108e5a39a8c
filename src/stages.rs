//! The question answering stages, in the order a pipeline runs them:
//! annotation, boxing, query construction, retrieval and answer extraction.

mod annotate;
mod answer;
mod boxer;
mod query_builder;
mod retrieval;

pub use annotate::AnnotationStage;
pub use answer::{AnswerOutcome, AnswerStage};
pub use boxer::Boxer;
pub use query_builder::{AnswerRole, QueryBuilder, QuestionFrame, extract_frame};
pub use retrieval::RetrievalStage;
