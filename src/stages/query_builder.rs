use crate::config::QueryBuilderConfig;
use crate::error::{AnnotationError, StageError};
use crate::models::{AnnotationKind, Document, Query, Span};
use crate::pipeline::{Stage, Unit};

/// Question words marking the argument a question asks about.
const WH_WORDS: [&str; 9] = [
    "what", "who", "whom", "whose", "which", "when", "where", "why", "how",
];

/// Which argument of the question's predicate is the expected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRole {
    /// The agent (ARG0) is asked about, e.g. "Who wrote Hamlet?".
    Arg0,
    /// The patient (ARG1) is asked about, e.g. "What did Shakespeare write?".
    Arg1,
    Unknown,
}

/// Predicate-argument structure extracted from a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFrame {
    pub verb: String,
    pub verb_lemma: Option<String>,
    /// First ARG0 span text, empty if none.
    pub arg0: String,
    /// First ARG1 span text, empty if none.
    pub arg1: String,
    pub answer_role: AnswerRole,
}

impl QuestionFrame {
    /// Builds the search phrase for this frame.
    ///
    /// A frame missing either argument has no usable structure and yields
    /// `fallback` untouched; no role-based branch is considered for it.
    pub fn phrase(&self, fallback: &str) -> String {
        if self.arg0.is_empty() || self.arg1.is_empty() {
            return fallback.to_string();
        }

        let phrase = match self.answer_role {
            AnswerRole::Unknown => format!("{} {} {}", self.arg0, self.verb, self.arg1),
            AnswerRole::Arg0 => format!("{} {}", self.arg1, self.verb),
            AnswerRole::Arg1 => format!("{} {}", self.arg0, self.verb),
        };
        phrase.to_lowercase()
    }
}

#[derive(Default)]
struct Candidate {
    predicate: usize,
    arg0: Option<Span>,
    arg1: Option<Span>,
}

/// Extracts the question frame from semantic role annotations.
///
/// Only links inside the first sentence are considered when sentences are
/// annotated. The frame comes from the first predicate with both ARG0 and
/// ARG1, else the first predicate with either.
pub fn extract_frame(doc: &Document) -> Result<QuestionFrame, AnnotationError> {
    if !doc.has_kind(AnnotationKind::PredicateLink) {
        return Err(AnnotationError::MissingKind(AnnotationKind::PredicateLink));
    }

    let scope = doc
        .annotations(AnnotationKind::Sentence)
        .first()
        .map(|sentence| sentence.span)
        .unwrap_or(Span::new(0, doc.text().len()));

    let mut candidates: Vec<Candidate> = Vec::new();
    for link in doc.predicate_links() {
        let Some((predicate, argument)) = doc.link_ends(link) else {
            continue;
        };
        if !scope.contains(&predicate.span) {
            continue;
        }

        let index = match candidates.iter().position(|c| c.predicate == link.parent) {
            Some(index) => index,
            None => {
                candidates.push(Candidate {
                    predicate: link.parent,
                    ..Candidate::default()
                });
                candidates.len() - 1
            }
        };
        let candidate = &mut candidates[index];

        match link.arg_type.as_str() {
            "ARG0" if candidate.arg0.is_none() => candidate.arg0 = Some(argument.span),
            "ARG1" if candidate.arg1.is_none() => candidate.arg1 = Some(argument.span),
            _ => {}
        }
    }

    let chosen = candidates
        .iter()
        .find(|c| c.arg0.is_some() && c.arg1.is_some())
        .or_else(|| candidates.iter().find(|c| c.arg0.is_some() || c.arg1.is_some()));

    let Some(chosen) = chosen else {
        return Ok(QuestionFrame {
            verb: String::new(),
            verb_lemma: None,
            arg0: String::new(),
            arg1: String::new(),
            answer_role: AnswerRole::Unknown,
        });
    };

    let predicate_span = doc.annotations(AnnotationKind::PredicateMention)[chosen.predicate].span;
    let span_text = |span: Option<Span>| {
        span.map(|s| doc.span_text(s).trim().to_string())
            .unwrap_or_default()
    };
    let arg0 = span_text(chosen.arg0);
    let arg1 = span_text(chosen.arg1);

    let answer_role = if mentions_wh_word(&arg0) {
        AnswerRole::Arg0
    } else if mentions_wh_word(&arg1) {
        AnswerRole::Arg1
    } else {
        AnswerRole::Unknown
    };

    Ok(QuestionFrame {
        verb: doc.span_text(predicate_span).to_string(),
        verb_lemma: doc
            .tokens_within(predicate_span)
            .find_map(|token| token.lemma())
            .map(String::from),
        arg0,
        arg1,
        answer_role,
    })
}

fn mentions_wh_word(text: &str) -> bool {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .any(|word| WH_WORDS.contains(&word.as_str()))
}

/// Turns the semantic roles of a question into a phrase search query.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    name: String,
    config: QueryBuilderConfig,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(QueryBuilderConfig::default())
    }
}

impl QueryBuilder {
    pub fn new(config: QueryBuilderConfig) -> Self {
        Self {
            name: "query_builder".to_string(),
            config,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &QueryBuilderConfig {
        &self.config
    }

    /// Builds the query for a role-labeled question document.
    pub fn build(&self, doc: &Document) -> Result<Query, StageError> {
        let frame = extract_frame(doc)?;
        let phrase = frame.phrase(doc.text().trim());

        tracing::debug!(
            verb = %frame.verb,
            arg0 = %frame.arg0,
            arg1 = %frame.arg1,
            role = ?frame.answer_role,
            %phrase,
            "built search phrase"
        );

        Ok(Query::new(
            phrase,
            self.config.field.as_str(),
            self.config.slop,
            self.config.size,
        )?)
    }
}

impl Stage for QueryBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) -> Result<(), StageError> {
        Ok(self.config.validate()?)
    }

    fn process(&self, unit: Unit) -> Result<Unit, StageError> {
        let mut set = unit.into_set(self.name())?;
        let key = self.config.query_key.as_str();

        let query = self.build(set.require(key)?)?;
        set.require_mut(key)?.attach_query(query);
        Ok(set.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Annotation, DocumentSet};

    fn frame(arg0: &str, verb: &str, arg1: &str, role: AnswerRole) -> QuestionFrame {
        QuestionFrame {
            verb: verb.to_string(),
            verb_lemma: None,
            arg0: arg0.to_string(),
            arg1: arg1.to_string(),
            answer_role: role,
        }
    }

    /// Annotates `text` with one predicate and the given `(label, substring)` arguments.
    fn labeled(text: &str, verb: &str, args: &[(&str, &str)]) -> Document {
        let mut doc = Document::new(text);
        let begin = text.find(verb).unwrap();
        let verb_span = Span::new(begin, begin + verb.len());
        doc.add_annotation(Annotation::token(
            verb_span.begin,
            verb_span.end,
            Some("VBD".to_string()),
            Some(format!("{}-lemma", verb)),
        ))
        .unwrap();
        let parent = doc
            .add_annotation(Annotation::predicate(verb_span.begin, verb_span.end))
            .unwrap();
        doc.mark_annotated(AnnotationKind::PredicateLink);

        for (label, arg) in args {
            let begin = text.find(arg).unwrap();
            let span = Span::new(begin, begin + arg.len());
            let child = doc
                .add_annotation(Annotation::argument(span.begin, span.end))
                .unwrap();
            doc.add_annotation(Annotation::link(verb_span.cover(&span), parent, child, *label))
                .unwrap();
        }
        doc
    }

    #[test]
    fn unknown_role_keeps_every_element() {
        let f = frame("The Cat", "chased", "the Mouse", AnswerRole::Unknown);
        assert_eq!(f.phrase("raw"), "the cat chased the mouse");
    }

    #[test]
    fn arg0_answer_drops_arg0() {
        let f = frame("the cat", "chased", "the mouse", AnswerRole::Arg0);
        assert_eq!(f.phrase("raw"), "the mouse chased");
    }

    #[test]
    fn arg1_answer_drops_arg1() {
        let f = frame("the cat", "chased", "the mouse", AnswerRole::Arg1);
        assert_eq!(f.phrase("raw"), "the cat chased");
    }

    #[test]
    fn missing_argument_falls_back_to_raw_text() {
        for role in [AnswerRole::Arg0, AnswerRole::Arg1, AnswerRole::Unknown] {
            let f = frame("", "sleeps", "the mouse", role);
            assert_eq!(f.phrase("Does The Cat sleep?"), "Does The Cat sleep?");

            let f = frame("the cat", "sleeps", "", role);
            assert_eq!(f.phrase("Does The Cat sleep?"), "Does The Cat sleep?");
        }
    }

    #[test]
    fn wh_word_in_arg0_marks_arg0_as_answer() {
        let doc = labeled(
            "Who wrote Hamlet?",
            "wrote",
            &[("ARG0", "Who"), ("ARG1", "Hamlet")],
        );

        let frame = extract_frame(&doc).unwrap();
        assert_eq!(frame.verb, "wrote");
        assert_eq!(frame.verb_lemma.as_deref(), Some("wrote-lemma"));
        assert_eq!(frame.answer_role, AnswerRole::Arg0);
        assert_eq!(frame.phrase(doc.text()), "hamlet wrote");
    }

    #[test]
    fn wh_word_in_arg1_marks_arg1_as_answer() {
        let doc = labeled(
            "What did Shakespeare write?",
            "write",
            &[("ARG1", "What"), ("ARG0", "Shakespeare")],
        );

        let frame = extract_frame(&doc).unwrap();
        assert_eq!(frame.arg0, "Shakespeare");
        assert_eq!(frame.arg1, "What");
        assert_eq!(frame.answer_role, AnswerRole::Arg1);
        assert_eq!(frame.phrase(doc.text()), "shakespeare write");
    }

    #[test]
    fn first_argument_of_each_type_wins() {
        let doc = labeled(
            "the cat chased the mouse and the dog",
            "chased",
            &[("ARG0", "the cat"), ("ARG1", "the mouse"), ("ARG1", "the dog")],
        );

        let frame = extract_frame(&doc).unwrap();
        assert_eq!(frame.arg1, "the mouse");
    }

    #[test]
    fn unannotated_document_is_rejected() {
        let result = extract_frame(&Document::new("Who wrote Hamlet?"));
        assert!(matches!(
            result,
            Err(AnnotationError::MissingKind(AnnotationKind::PredicateLink))
        ));
    }

    #[test]
    fn annotated_document_without_frames_uses_raw_text() {
        let mut doc = Document::new("  Hello there  ");
        doc.mark_annotated(AnnotationKind::PredicateLink);

        let query = QueryBuilder::default().build(&doc).unwrap();
        assert_eq!(query.match_text(), "Hello there");
    }

    #[test]
    fn build_uses_configured_field_and_size() {
        let doc = labeled(
            "the cat chased the mouse",
            "chased",
            &[("ARG0", "the cat"), ("ARG1", "the mouse")],
        );
        let builder = QueryBuilder::new(QueryBuilderConfig {
            field: "body".to_string(),
            size: 10,
            ..QueryBuilderConfig::default()
        });

        let query = builder.build(&doc).unwrap();
        assert_eq!(query.match_text(), "the cat chased the mouse");
        assert_eq!(query.field(), "body");
        assert_eq!(query.size(), 10);
        assert_eq!(query.slop(), 10);
    }

    #[test]
    fn stage_attaches_query_to_query_member() {
        let doc = labeled(
            "Who wrote Hamlet?",
            "wrote",
            &[("ARG0", "Who"), ("ARG1", "Hamlet")],
        );
        let unit = QueryBuilder::default()
            .process(DocumentSet::boxed("query", doc).into())
            .unwrap();

        let set = unit.as_set().unwrap();
        let query = set.get("query").unwrap().query().unwrap();
        assert_eq!(query.match_text(), "hamlet wrote");
    }

    #[test]
    fn only_first_sentence_supplies_the_frame() {
        use crate::backend::{SrlFrame, SrlResponse, apply_response};

        let words = ["Marlowe", "wrote", "Faustus", ".", "Who", "wrote", "Hamlet", "?"];
        let frame_tags = |tags: [&str; 8]| SrlFrame {
            verb: "wrote".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        let response = SrlResponse {
            words: words.iter().map(|w| w.to_string()).collect(),
            verbs: vec![
                frame_tags(["B-ARG0", "B-V", "B-ARG1", "O", "O", "O", "O", "O"]),
                frame_tags(["O", "O", "O", "O", "B-ARG0", "B-V", "B-ARG1", "O"]),
            ],
            ..SrlResponse::default()
        };
        let kinds = [
            AnnotationKind::Sentence,
            AnnotationKind::Token,
            AnnotationKind::PredicateLink,
        ]
        .into_iter()
        .collect();
        let doc = apply_response(
            Document::new("Marlowe wrote Faustus. Who wrote Hamlet?"),
            &response,
            &kinds,
        )
        .unwrap();

        assert_eq!(doc.annotations(AnnotationKind::Sentence).len(), 2);
        let frame = extract_frame(&doc).unwrap();
        assert_eq!(frame.arg0, "Marlowe");
        assert_eq!(frame.verb_lemma.as_deref(), Some("write"));
        assert_eq!(frame.answer_role, AnswerRole::Unknown);
        assert_eq!(frame.phrase(doc.text()), "marlowe wrote faustus");
    }

    #[test]
    fn stage_requires_query_member() {
        let result = QueryBuilder::default().process(DocumentSet::new("empty").into());
        assert!(matches!(result, Err(StageError::Configuration(_))));
    }
}
