//! Staged execution of documents with checkpointing.
//!
//! A [`Pipeline`] pulls documents from a [`DocumentSource`] and pushes each
//! one through its stages in declared order. A run can stop after a named
//! stage (a checkpoint) and a later run can resume after that stage with the
//! checkpointed units, so upstream stages never run twice.
//!
//! # Examples
//!
//! ```
//! use qapipe::{FailurePolicy, Pipeline, TextReader};
//! use qapipe::stages::Boxer;
//!
//! let mut pipeline = Pipeline::builder()
//!     .reader(TextReader::new(["Who wrote Hamlet?"]))
//!     .stage(Boxer::new("query"))
//!     .failure_policy(FailurePolicy::Continue)
//!     .build()
//!     .unwrap();
//!
//! let units: Vec<_> = pipeline.run(None).unwrap().collect();
//! let set = units[0].as_ref().unwrap().as_set().unwrap();
//! assert_eq!(set.query_key(), Some("query"));
//! ```

mod reader;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;
use crate::error::{ConfigurationError, PipelineError, StageError, UnitFailure};
use crate::models::{Document, DocumentSet};

pub use reader::{DocumentSource, LineReader, TextReader};

/// The unit of work flowing between stages.
///
/// A bare document until a boxing stage wraps it into a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Document(Document),
    Set(DocumentSet),
}

impl Unit {
    fn describe(&self) -> &'static str {
        match self {
            Unit::Document(_) => "document",
            Unit::Set(_) => "document set",
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Unit::Document(doc) => Some(doc),
            Unit::Set(_) => None,
        }
    }

    pub fn as_set(&self) -> Option<&DocumentSet> {
        match self {
            Unit::Set(set) => Some(set),
            Unit::Document(_) => None,
        }
    }

    /// Unwraps a document, failing on behalf of `stage` otherwise.
    pub fn into_document(self, stage: &str) -> Result<Document, ConfigurationError> {
        match self {
            Unit::Document(doc) => Ok(doc),
            other => Err(other.unexpected(stage, "document")),
        }
    }

    /// Unwraps a document set, failing on behalf of `stage` otherwise.
    pub fn into_set(self, stage: &str) -> Result<DocumentSet, ConfigurationError> {
        match self {
            Unit::Set(set) => Ok(set),
            other => Err(other.unexpected(stage, "document set")),
        }
    }

    fn unexpected(&self, stage: &str, expected: &'static str) -> ConfigurationError {
        ConfigurationError::UnexpectedUnit {
            stage: stage.to_string(),
            expected,
            found: self.describe(),
        }
    }
}

impl From<Document> for Unit {
    fn from(doc: Document) -> Self {
        Unit::Document(doc)
    }
}

impl From<DocumentSet> for Unit {
    fn from(set: DocumentSet) -> Self {
        Unit::Set(set)
    }
}

/// One transformation step of a pipeline.
pub trait Stage {
    /// Unique name within the pipeline; used for checkpoints and failure reports.
    fn name(&self) -> &str;

    /// The external capability this stage calls, if any.
    fn requires(&self) -> Option<CapabilityKind> {
        None
    }

    /// Prepares the stage's capability. Called once, before the first unit.
    fn initialize(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Releases the stage's capability.
    fn close(&self) {}

    fn process(&self, unit: Unit) -> Result<Unit, StageError>;
}

/// What a run does after a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the failure and carry on with the next unit.
    Continue,
    /// Report the failure and end the run.
    Halt,
}

struct StageSlot {
    stage: Box<dyn Stage>,
    initialized: bool,
}

/// Builder for [`Pipeline`]. The failure policy has no default and must be set.
#[derive(Default)]
pub struct PipelineBuilder {
    reader: Option<Box<dyn DocumentSource>>,
    stages: Vec<Box<dyn Stage>>,
    policy: Option<FailurePolicy>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(mut self, reader: impl DocumentSource + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Appends a stage; stages run in the order they are added.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        let reader = self.reader.ok_or(ConfigurationError::MissingReader)?;
        let policy = self.policy.ok_or(ConfigurationError::MissingFailurePolicy)?;

        let mut names: Vec<&str> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if names.contains(&stage.name()) {
                return Err(ConfigurationError::DuplicateStage(stage.name().to_string()));
            }
            names.push(stage.name());
        }

        let stages = self
            .stages
            .into_iter()
            .map(|stage| StageSlot {
                stage,
                initialized: false,
            })
            .collect();

        Ok(Pipeline {
            reader,
            stages,
            policy,
        })
    }
}

/// An ordered list of stages fed by a document source.
pub struct Pipeline {
    reader: Box<dyn DocumentSource>,
    stages: Vec<StageSlot>,
    policy: FailurePolicy,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|slot| slot.stage.name()).collect()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Runs every document from the reader through the stages.
    ///
    /// With a checkpoint, each unit stops right after the named stage and is
    /// yielded as is. Only stages up to the checkpoint are initialized.
    pub fn run(&mut self, checkpoint: Option<&str>) -> Result<PipelineRun<'_>, PipelineError> {
        let end = self.end_of(checkpoint)?;
        self.initialize(0..end)?;

        tracing::info!(
            stages = end,
            checkpoint = checkpoint.unwrap_or("<none>"),
            "starting pipeline run"
        );

        let Pipeline {
            reader,
            stages,
            policy,
        } = self;

        Ok(PipelineRun::new(
            &stages[..end],
            Box::new(reader.documents().map(Unit::Document)),
            *policy,
        ))
    }

    /// Runs already-processed units through the stages after `after`.
    ///
    /// Feeding the output of `run(Some(after))` here gives the same result
    /// as a single uninterrupted run.
    pub fn resume<'a, I>(
        &'a mut self,
        after: &str,
        units: I,
        checkpoint: Option<&str>,
    ) -> Result<PipelineRun<'a>, PipelineError>
    where
        I: IntoIterator<Item = Unit>,
        I::IntoIter: 'a,
    {
        let start = self.position(after)? + 1;
        let end = self.end_of(checkpoint)?;
        if let Some(checkpoint) = checkpoint
            && end <= start
        {
            return Err(ConfigurationError::CheckpointOrder {
                checkpoint: checkpoint.to_string(),
                after: after.to_string(),
            }
            .into());
        }
        self.initialize(start..end)?;

        tracing::info!(after, stages = end - start, "resuming pipeline run");

        Ok(PipelineRun::new(
            &self.stages[start..end],
            Box::new(units.into_iter()),
            self.policy,
        ))
    }

    /// Closes every initialized stage, last stage first.
    pub fn close(&mut self) {
        for slot in self.stages.iter_mut().rev().filter(|slot| slot.initialized) {
            slot.stage.close();
            slot.initialized = false;
        }
    }

    fn position(&self, name: &str) -> Result<usize, ConfigurationError> {
        self.stages
            .iter()
            .position(|slot| slot.stage.name() == name)
            .ok_or_else(|| ConfigurationError::UnknownStage(name.to_string()))
    }

    /// Exclusive end index of the stages a run executes.
    fn end_of(&self, checkpoint: Option<&str>) -> Result<usize, ConfigurationError> {
        match checkpoint {
            Some(name) => self.position(name).map(|i| i + 1),
            None => Ok(self.stages.len()),
        }
    }

    fn initialize(&mut self, range: std::ops::Range<usize>) -> Result<(), PipelineError> {
        for slot in &mut self.stages[range] {
            if slot.initialized {
                continue;
            }
            tracing::debug!(stage = slot.stage.name(), "initializing stage");
            slot.stage
                .initialize()
                .map_err(|source| PipelineError::Initialization {
                    stage: slot.stage.name().to_string(),
                    source,
                })?;
            slot.initialized = true;
        }
        Ok(())
    }
}

/// Lazy sequence of processed units, one per input unit.
///
/// Failed units are yielded as [`UnitFailure`]s. Configuration failures end
/// the run under either policy.
pub struct PipelineRun<'a> {
    stages: &'a [StageSlot],
    input: Box<dyn Iterator<Item = Unit> + 'a>,
    policy: FailurePolicy,
    next_unit: usize,
    halted: bool,
}

impl<'a> PipelineRun<'a> {
    fn new(
        stages: &'a [StageSlot],
        input: Box<dyn Iterator<Item = Unit> + 'a>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            stages,
            input,
            policy,
            next_unit: 0,
            halted: false,
        }
    }

    fn process(&self, index: usize, mut unit: Unit) -> Result<Unit, UnitFailure> {
        for slot in self.stages {
            let name = slot.stage.name();
            tracing::debug!(unit = index, stage = name, "running stage");
            unit = slot.stage.process(unit).map_err(|source| UnitFailure {
                unit: index,
                stage: name.to_string(),
                source,
            })?;
        }
        Ok(unit)
    }
}

impl Iterator for PipelineRun<'_> {
    type Item = Result<Unit, UnitFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }

        let unit = self.input.next()?;
        let index = self.next_unit;
        self.next_unit += 1;

        match self.process(index, unit) {
            Ok(unit) => Some(Ok(unit)),
            Err(failure) => {
                tracing::warn!(
                    unit = failure.unit,
                    stage = %failure.stage,
                    error = %failure.source,
                    "unit failed"
                );
                if failure.source.is_fatal() || self.policy == FailurePolicy::Halt {
                    self.halted = true;
                }
                Some(Err(failure))
            }
        }
    }
}
