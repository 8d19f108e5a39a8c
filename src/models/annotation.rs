use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of linguistic annotation a document can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// A sentence boundary.
    Sentence,
    /// A word token, optionally with part of speech and lemma.
    Token,
    /// The predicate (usually a verb) of a semantic role frame.
    PredicateMention,
    /// An argument span of a semantic role frame.
    PredicateArgument,
    /// A labeled edge from a predicate mention to one of its arguments.
    PredicateLink,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentence => write!(f, "sentence"),
            Self::Token => write!(f, "token"),
            Self::PredicateMention => write!(f, "predicate_mention"),
            Self::PredicateArgument => write!(f, "predicate_argument"),
            Self::PredicateLink => write!(f, "predicate_link"),
        }
    }
}

/// Half-open byte range `[begin, end)` into a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Returns true if `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.begin.min(other.begin), self.end.max(other.end))
    }
}

/// Edge between a predicate and one of its arguments.
///
/// `parent` indexes the owning document's `PredicateMention` sequence and
/// `child` its `PredicateArgument` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateLink {
    pub parent: usize,
    pub child: usize,
    /// Role label such as `ARG0`, `ARG1` or `ARGM-TMP`.
    pub arg_type: String,
}

/// Kind-specific payload of an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationData {
    Sentence,
    Token {
        pos: Option<String>,
        lemma: Option<String>,
    },
    PredicateMention,
    PredicateArgument,
    PredicateLink(PredicateLink),
}

/// A single annotation record over a document span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub span: Span,
    #[serde(flatten)]
    pub data: AnnotationData,
}

impl Annotation {
    pub fn sentence(begin: usize, end: usize) -> Self {
        Self {
            span: Span::new(begin, end),
            data: AnnotationData::Sentence,
        }
    }

    pub fn token(begin: usize, end: usize, pos: Option<String>, lemma: Option<String>) -> Self {
        Self {
            span: Span::new(begin, end),
            data: AnnotationData::Token { pos, lemma },
        }
    }

    pub fn predicate(begin: usize, end: usize) -> Self {
        Self {
            span: Span::new(begin, end),
            data: AnnotationData::PredicateMention,
        }
    }

    pub fn argument(begin: usize, end: usize) -> Self {
        Self {
            span: Span::new(begin, end),
            data: AnnotationData::PredicateArgument,
        }
    }

    pub fn link(span: Span, parent: usize, child: usize, arg_type: impl Into<String>) -> Self {
        Self {
            span,
            data: AnnotationData::PredicateLink(PredicateLink {
                parent,
                child,
                arg_type: arg_type.into(),
            }),
        }
    }

    /// Returns the kind this annotation is stored under.
    pub fn kind(&self) -> AnnotationKind {
        match self.data {
            AnnotationData::Sentence => AnnotationKind::Sentence,
            AnnotationData::Token { .. } => AnnotationKind::Token,
            AnnotationData::PredicateMention => AnnotationKind::PredicateMention,
            AnnotationData::PredicateArgument => AnnotationKind::PredicateArgument,
            AnnotationData::PredicateLink(_) => AnnotationKind::PredicateLink,
        }
    }

    /// Part of speech, for tokens that carry one.
    pub fn pos(&self) -> Option<&str> {
        match &self.data {
            AnnotationData::Token { pos, .. } => pos.as_deref(),
            _ => None,
        }
    }

    /// Lemma, for tokens that carry one.
    pub fn lemma(&self) -> Option<&str> {
        match &self.data {
            AnnotationData::Token { lemma, .. } => lemma.as_deref(),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&PredicateLink> {
        match &self.data {
            AnnotationData::PredicateLink(link) => Some(link),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_payload() {
        assert_eq!(Annotation::sentence(0, 4).kind(), AnnotationKind::Sentence);
        assert_eq!(
            Annotation::token(0, 4, None, None).kind(),
            AnnotationKind::Token
        );
        assert_eq!(
            Annotation::link(Span::new(0, 4), 0, 0, "ARG0").kind(),
            AnnotationKind::PredicateLink
        );
    }

    #[test]
    fn token_accessors() {
        let token = Annotation::token(0, 3, Some("NN".to_string()), Some("cat".to_string()));
        assert_eq!(token.pos(), Some("NN"));
        assert_eq!(token.lemma(), Some("cat"));
        assert_eq!(Annotation::sentence(0, 3).pos(), None);
    }

    #[test]
    fn span_cover_and_contains() {
        let a = Span::new(4, 10);
        let b = Span::new(0, 3);
        let covered = a.cover(&b);

        assert_eq!(covered, Span::new(0, 10));
        assert!(covered.contains(&a));
        assert!(covered.contains(&b));
        assert!(!a.contains(&b));
    }

    #[test]
    fn link_serializes_with_kind_tag() {
        let link = Annotation::link(Span::new(0, 7), 0, 1, "ARG1");
        let json = serde_json::to_value(&link).unwrap();

        assert_eq!(json["kind"], "predicate_link");
        assert_eq!(json["arg_type"], "ARG1");
        assert_eq!(json["span"]["end"], 7);
    }

    #[test]
    fn kind_display() {
        assert_eq!(AnnotationKind::PredicateLink.to_string(), "predicate_link");
        assert_eq!(AnnotationKind::Token.to_string(), "token");
    }
}
