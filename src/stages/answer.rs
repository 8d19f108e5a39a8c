use std::sync::Arc;

use crate::capability::{CapabilityKind, QaCapability};
use crate::config::AnswerConfig;
use crate::error::{ConfigurationError, ExtractionError, StageError};
use crate::models::{AnswerResult, DocumentSet, ExtractionFailure};
use crate::pipeline::{Stage, Unit};

/// Answers and per-member failures from one pass over a document set.
#[derive(Debug, Default)]
pub struct AnswerOutcome {
    /// One entry per successfully processed member, in member order.
    pub results: Vec<AnswerResult>,
    pub failures: Vec<ExtractionError>,
}

/// Asks the question held by the query member against every other member.
pub struct AnswerStage {
    name: String,
    config: AnswerConfig,
    extractor: Arc<dyn QaCapability>,
}

impl AnswerStage {
    pub fn new(config: AnswerConfig, extractor: Arc<dyn QaCapability>) -> Self {
        Self {
            name: "answer".to_string(),
            config,
            extractor,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Extracts an answer from each non-query member of `set`.
    ///
    /// A failing member is collected in the outcome and does not stop the
    /// others. Only a missing query member fails the whole call.
    pub fn apply(&self, set: &DocumentSet) -> Result<AnswerOutcome, ConfigurationError> {
        let key = self.config.query_key.as_str();
        let question = set.require(key)?.text();

        let mut outcome = AnswerOutcome::default();
        for (member, doc) in set.members().filter(|(member, _)| *member != key) {
            match self.extractor.answer(question, doc.text()) {
                Ok(answer) => outcome.results.push(AnswerResult::new(
                    member,
                    answer.answer_text,
                    answer.score,
                )),
                Err(source) => outcome.failures.push(ExtractionError {
                    key: member.to_string(),
                    source,
                }),
            }
        }

        Ok(outcome)
    }
}

impl Stage for AnswerStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Option<CapabilityKind> {
        Some(CapabilityKind::QuestionAnswering)
    }

    fn initialize(&self) -> Result<(), StageError> {
        self.config.validate()?;
        self.extractor
            .init()
            .map_err(|source| StageError::Initialization {
                capability: CapabilityKind::QuestionAnswering,
                source,
            })
    }

    fn close(&self) {
        self.extractor.close();
    }

    fn process(&self, unit: Unit) -> Result<Unit, StageError> {
        let mut set = unit.into_set(self.name())?;
        let outcome = self.apply(&set)?;

        tracing::info!(
            set = set.name(),
            answers = outcome.results.len(),
            failures = outcome.failures.len(),
            "extracted answers"
        );

        for failure in &outcome.failures {
            tracing::warn!(error = %failure, "skipping member");
            set.record_failure(ExtractionFailure::from(failure));
        }
        for answer in outcome.results {
            set.record_answer(answer);
        }

        Ok(set.into())
    }
}
