use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Annotation, AnnotationKind, PredicateLink, Query, Span};
use crate::error::AnnotationError;

/// A text blob plus the annotations attached to it.
///
/// The text never changes after construction. Annotations are appended and
/// never removed; every span is validated against the text on insertion.
///
/// # Examples
///
/// ```
/// use qapipe::{Annotation, AnnotationKind, Document};
///
/// let mut doc = Document::new("Who wrote Hamlet?");
/// doc.add_annotation(Annotation::token(0, 3, None, None)).unwrap();
///
/// let token = &doc.annotations(AnnotationKind::Token)[0];
/// assert_eq!(doc.covered_text(token), "Who");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct Document {
    text: String,
    annotations: BTreeMap<AnnotationKind, Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<Query>,
}

/// Serialized form of a [`Document`], checked by replaying every annotation.
#[derive(Deserialize)]
struct RawDocument {
    text: String,
    #[serde(default)]
    annotations: BTreeMap<AnnotationKind, Vec<Annotation>>,
    #[serde(default)]
    query: Option<Query>,
}

impl TryFrom<RawDocument> for Document {
    type Error = AnnotationError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let mut doc = Document::new(raw.text);
        // Kinds iterate in declaration order, so links come after their ends.
        for (kind, records) in raw.annotations {
            doc.mark_annotated(kind);
            for annotation in records {
                if annotation.kind() != kind {
                    return Err(AnnotationError::MisfiledAnnotation {
                        expected: kind,
                        found: annotation.kind(),
                    });
                }
                doc.add_annotation(annotation)?;
            }
        }
        doc.query = raw.query;
        Ok(doc)
    }
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: BTreeMap::new(),
            query: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Appends an annotation and returns its index within its kind.
    ///
    /// Predicate links must reference mentions and arguments that already exist.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<usize, AnnotationError> {
        self.check_span(annotation.span)?;

        if let Some(link) = annotation.as_link() {
            self.check_reference(AnnotationKind::PredicateMention, link.parent)?;
            self.check_reference(AnnotationKind::PredicateArgument, link.child)?;
        }

        let records = self.annotations.entry(annotation.kind()).or_default();
        records.push(annotation);
        Ok(records.len() - 1)
    }

    /// Records that `kind` was annotated, even if no record was produced.
    pub fn mark_annotated(&mut self, kind: AnnotationKind) {
        self.annotations.entry(kind).or_default();
    }

    /// Returns true if an annotator has run for `kind`.
    pub fn has_kind(&self, kind: AnnotationKind) -> bool {
        self.annotations.contains_key(&kind)
    }

    /// Returns all annotations of `kind` in insertion order.
    pub fn annotations(&self, kind: AnnotationKind) -> &[Annotation] {
        self.annotations
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the text under `span`, or an empty string for a foreign span.
    pub fn span_text(&self, span: Span) -> &str {
        self.text.get(span.begin..span.end).unwrap_or_default()
    }

    pub fn covered_text(&self, annotation: &Annotation) -> &str {
        self.span_text(annotation.span)
    }

    /// Tokens lying entirely inside `span`.
    pub fn tokens_within(&self, span: Span) -> impl Iterator<Item = &Annotation> {
        self.annotations(AnnotationKind::Token)
            .iter()
            .filter(move |token| span.contains(&token.span))
    }

    /// Iterates over predicate links in insertion order.
    pub fn predicate_links(&self) -> impl Iterator<Item = &PredicateLink> {
        self.annotations(AnnotationKind::PredicateLink)
            .iter()
            .filter_map(Annotation::as_link)
    }

    /// Resolves a link to its predicate mention and argument.
    pub fn link_ends(&self, link: &PredicateLink) -> Option<(&Annotation, &Annotation)> {
        let predicate = self
            .annotations(AnnotationKind::PredicateMention)
            .get(link.parent)?;
        let argument = self
            .annotations(AnnotationKind::PredicateArgument)
            .get(link.child)?;
        Some((predicate, argument))
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Attaches the search query built for this document.
    pub fn attach_query(&mut self, query: Query) {
        self.query = Some(query);
    }

    fn check_span(&self, span: Span) -> Result<(), AnnotationError> {
        if span.begin > span.end || span.end > self.text.len() {
            return Err(AnnotationError::SpanOutOfBounds {
                begin: span.begin,
                end: span.end,
                len: self.text.len(),
            });
        }
        if !self.text.is_char_boundary(span.begin) || !self.text.is_char_boundary(span.end) {
            return Err(AnnotationError::SpanNotOnCharBoundary {
                begin: span.begin,
                end: span.end,
            });
        }
        Ok(())
    }

    fn check_reference(&self, kind: AnnotationKind, index: usize) -> Result<(), AnnotationError> {
        if index < self.annotations(kind).len() {
            Ok(())
        } else {
            Err(AnnotationError::DanglingReference { kind, index })
        }
    }
}
