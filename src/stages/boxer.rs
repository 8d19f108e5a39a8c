use crate::config::BoxerConfig;
use crate::error::StageError;
use crate::models::{Document, DocumentSet};
use crate::pipeline::{Stage, Unit};

/// Promotes a bare document into a document set.
///
/// The set is named after the box key and holds the document under that key,
/// marked as the query member.
#[derive(Debug, Clone)]
pub struct Boxer {
    name: String,
    config: BoxerConfig,
}

impl Boxer {
    pub fn new(box_key: impl Into<String>) -> Self {
        Self::with_config(BoxerConfig {
            box_key: box_key.into(),
        })
    }

    pub fn with_config(config: BoxerConfig) -> Self {
        Self {
            name: "boxer".to_string(),
            config,
        }
    }

    /// Renames the stage, for pipelines that box more than once.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn box_key(&self) -> &str {
        &self.config.box_key
    }

    pub fn apply(&self, doc: Document) -> DocumentSet {
        DocumentSet::boxed(self.config.box_key.as_str(), doc)
    }
}

impl Stage for Boxer {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<(), StageError> {
        Ok(self.config.validate()?)
    }

    fn process(&self, unit: Unit) -> Result<Unit, StageError> {
        let doc = unit.into_document(self.name())?;
        Ok(self.apply(doc).into())
    }
}
