use std::collections::BTreeSet;
use std::sync::Arc;

use crate::capability::{AnnotationCapability, CapabilityKind};
use crate::error::StageError;
use crate::models::AnnotationKind;
use crate::pipeline::{Stage, Unit};

/// Runs an annotation capability over each document.
pub struct AnnotationStage {
    name: String,
    annotator: Arc<dyn AnnotationCapability>,
    kinds: BTreeSet<AnnotationKind>,
}

impl AnnotationStage {
    pub fn new(
        name: impl Into<String>,
        annotator: Arc<dyn AnnotationCapability>,
        kinds: impl IntoIterator<Item = AnnotationKind>,
    ) -> Self {
        Self {
            name: name.into(),
            annotator,
            kinds: kinds.into_iter().collect(),
        }
    }

    /// An annotation stage requesting sentences, tokens and semantic roles.
    pub fn srl(annotator: Arc<dyn AnnotationCapability>) -> Self {
        Self::new(
            "srl",
            annotator,
            [
                AnnotationKind::Sentence,
                AnnotationKind::Token,
                AnnotationKind::PredicateMention,
                AnnotationKind::PredicateArgument,
                AnnotationKind::PredicateLink,
            ],
        )
    }

    pub fn kinds(&self) -> &BTreeSet<AnnotationKind> {
        &self.kinds
    }
}

impl Stage for AnnotationStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> Option<CapabilityKind> {
        Some(CapabilityKind::Annotation)
    }

    fn initialize(&self) -> Result<(), StageError> {
        self.annotator
            .init()
            .map_err(|source| StageError::Initialization {
                capability: CapabilityKind::Annotation,
                source,
            })
    }

    fn close(&self) {
        self.annotator.close();
    }

    fn process(&self, unit: Unit) -> Result<Unit, StageError> {
        let doc = unit.into_document(&self.name)?;
        let doc = self.annotator.annotate(doc, &self.kinds)?;
        Ok(doc.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::error::AnnotationError;
    use crate::models::{Annotation, Document};

    /// Tokenizes on single spaces.
    struct SpaceTokenizer;

    impl AnnotationCapability for SpaceTokenizer {
        fn annotate(
            &self,
            mut doc: Document,
            kinds: &BTreeSet<AnnotationKind>,
        ) -> Result<Document, AnnotationError> {
            if kinds.contains(&AnnotationKind::Token) {
                let text = doc.text().to_string();
                let mut begin = 0;
                for word in text.split(' ') {
                    doc.add_annotation(Annotation::token(begin, begin + word.len(), None, None))?;
                    begin += word.len() + 1;
                }
            }
            Ok(doc)
        }
    }

    struct Unreachable;

    impl AnnotationCapability for Unreachable {
        fn init(&self) -> Result<(), BackendError> {
            Err(BackendError::Http { status: 503 })
        }

        fn annotate(
            &self,
            _doc: Document,
            _kinds: &BTreeSet<AnnotationKind>,
        ) -> Result<Document, AnnotationError> {
            Err(AnnotationError::Capability(BackendError::Http { status: 503 }))
        }
    }

    #[test]
    fn appends_requested_annotations() {
        let stage = AnnotationStage::new("tokens", Arc::new(SpaceTokenizer), [AnnotationKind::Token]);

        let unit = stage.process(Document::new("who wrote hamlet").into()).unwrap();
        let doc = unit.as_document().unwrap();
        assert_eq!(doc.annotations(AnnotationKind::Token).len(), 3);
    }

    #[test]
    fn capability_failure_is_an_annotation_error() {
        let stage = AnnotationStage::srl(Arc::new(Unreachable));
        let result = stage.process(Document::new("who").into());

        assert!(matches!(result, Err(StageError::Annotation(_))));
        assert_eq!(stage.requires(), Some(CapabilityKind::Annotation));
    }

    #[test]
    fn init_failure_names_capability() {
        let stage = AnnotationStage::srl(Arc::new(Unreachable));
        let error = stage.initialize().unwrap_err();

        assert!(error.is_fatal());
        assert!(error.to_string().starts_with("annotation capability failed to initialize"));
    }
}
