//! End-to-end runs of the question answering pipeline against in-process
//! capabilities.
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use qapipe::backend::{SrlResponse, apply_response};
use qapipe::config::{RetrievalConfig, Settings};
use qapipe::stages::{AnnotationStage, AnswerStage, Boxer, QueryBuilder, RetrievalStage};
use qapipe::{
    AnnotationCapability, AnnotationError, AnnotationKind, BackendError, Document,
    ExtractedAnswer, FailurePolicy, Pipeline, PipelineError, QaCapability, Query,
    SearchCapability, SearchHit, TextReader, Unit,
};
use serde_json::json;

/// Serves predictor responses recorded for known questions.
struct RecordedSrl {
    responses: HashMap<String, SrlResponse>,
}

impl RecordedSrl {
    fn new() -> Self {
        let recorded = [
            json!({
                "text": "Who wrote Hamlet?",
                "words": ["Who", "wrote", "Hamlet", "?"],
                "verbs": [{"verb": "wrote", "tags": ["B-ARG0", "B-V", "B-ARG1", "O"]}]
            }),
            json!({
                "text": "What did Marlowe write?",
                "words": ["What", "did", "Marlowe", "write", "?"],
                "verbs": [
                    {"verb": "did", "tags": ["O", "B-V", "O", "O", "O"]},
                    {"verb": "write", "tags": ["B-ARG1", "O", "B-ARG0", "B-V", "O"]}
                ]
            }),
        ];

        let responses = recorded
            .into_iter()
            .map(|value| {
                let text = value["text"].as_str().unwrap().to_string();
                (text, serde_json::from_value(value).unwrap())
            })
            .collect();
        Self { responses }
    }
}

impl AnnotationCapability for RecordedSrl {
    fn annotate(
        &self,
        doc: Document,
        kinds: &BTreeSet<AnnotationKind>,
    ) -> Result<Document, AnnotationError> {
        if doc.text().contains("garbled") {
            return Err(AnnotationError::Capability(BackendError::Http { status: 500 }));
        }

        let response = match self.responses.get(doc.text()) {
            Some(response) => response.clone(),
            None => SrlResponse {
                words: doc.text().split_whitespace().map(String::from).collect(),
                ..SrlResponse::default()
            },
        };
        apply_response(doc, &response, kinds)
    }
}

/// Returns every passage containing all words of the phrase, in index order.
struct PassageIndex {
    passages: Vec<&'static str>,
    queries: Mutex<Vec<String>>,
    available: bool,
}

impl PassageIndex {
    fn new(passages: Vec<&'static str>) -> Self {
        Self {
            passages,
            queries: Mutex::new(Vec::new()),
            available: true,
        }
    }

    fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchCapability for PassageIndex {
    fn init(&self) -> Result<(), BackendError> {
        if self.available {
            Ok(())
        } else {
            Err(BackendError::Http { status: 503 })
        }
    }

    fn find(&self, query: &Query) -> Result<Vec<SearchHit>, BackendError> {
        let phrase = query.match_text().to_lowercase();
        self.queries.lock().unwrap().push(phrase.clone());

        Ok(self
            .passages
            .iter()
            .filter(|passage| {
                let passage = passage.to_lowercase();
                phrase.split_whitespace().all(|word| passage.contains(word))
            })
            .enumerate()
            .map(|(rank, passage)| SearchHit::new(*passage, 1.0 / (rank + 1) as f64))
            .collect())
    }
}

/// Answers with the first word of the context.
struct FirstWord;

impl QaCapability for FirstWord {
    fn answer(&self, _question: &str, context: &str) -> Result<ExtractedAnswer, BackendError> {
        if context.contains("unreadable") {
            return Err(BackendError::Http { status: 500 });
        }
        let word = context.split_whitespace().next().unwrap_or_default();
        Ok(ExtractedAnswer::new(word, 0.75))
    }
}

fn library() -> Arc<PassageIndex> {
    Arc::new(PassageIndex::new(vec![
        "Shakespeare wrote Hamlet around 1600.",
        "Marlowe would write Doctor Faustus.",
        "Hamlet wrote letters to Ophelia.",
        "unreadable scan where Marlowe did write more",
    ]))
}

fn pipeline(
    questions: &[&str],
    search: Arc<PassageIndex>,
    policy: FailurePolicy,
) -> Pipeline {
    let settings = Settings::default();
    Pipeline::builder()
        .reader(TextReader::new(questions.iter().copied()))
        .stage(AnnotationStage::srl(Arc::new(RecordedSrl::new())))
        .stage(Boxer::with_config(settings.boxer))
        .stage(QueryBuilder::new(settings.query_builder))
        .stage(RetrievalStage::new(settings.retrieval, search))
        .stage(AnswerStage::new(settings.answer, Arc::new(FirstWord)))
        .failure_policy(policy)
        .build()
        .unwrap()
}

fn successful(units: Vec<Result<Unit, qapipe::UnitFailure>>) -> Vec<Unit> {
    units.into_iter().map(Result::unwrap).collect()
}

#[test]
fn answers_question_from_matching_passages() {
    let search = library();
    let mut pipeline = pipeline(&["Who wrote Hamlet?"], search.clone(), FailurePolicy::Halt);

    let units = successful(pipeline.run(None).unwrap().collect());
    pipeline.close();

    assert_eq!(units.len(), 1);
    let set = units[0].as_set().unwrap();

    // ARG0 holds the wh-word, so only ARG1 and the verb are searched.
    assert_eq!(search.queries(), vec!["hamlet wrote"]);
    assert_eq!(
        set.keys().collect::<Vec<_>>(),
        vec!["query", "passage_0", "passage_1"]
    );

    let answers: Vec<(&str, &str)> = set
        .answers()
        .iter()
        .map(|a| (a.source_key.as_str(), a.answer_text.as_str()))
        .collect();
    assert_eq!(
        answers,
        vec![("passage_0", "Shakespeare"), ("passage_1", "Hamlet")]
    );
}

#[test]
fn auxiliary_without_arguments_is_skipped() {
    let search = library();
    let mut pipeline = pipeline(&["What did Marlowe write?"], search.clone(), FailurePolicy::Halt);

    let units = successful(pipeline.run(None).unwrap().collect());
    let set = units[0].as_set().unwrap();

    assert_eq!(search.queries(), vec!["marlowe write"]);
    assert_eq!(set.get("passage_0").unwrap().text(), "Marlowe would write Doctor Faustus.");
    assert_eq!(set.answers().len(), 1);
    assert_eq!(set.failures().len(), 1);
    assert_eq!(set.failures()[0].key, "passage_1");
}

#[test]
fn question_without_frames_is_searched_verbatim() {
    let search = library();
    let mut pipeline = pipeline(&["Hamlet"], search.clone(), FailurePolicy::Halt);

    let units = successful(pipeline.run(Some("query_builder")).unwrap().collect());
    let set = units[0].as_set().unwrap();

    let query = set.get("query").unwrap().query().unwrap();
    assert_eq!(query.match_text(), "Hamlet");
    assert_eq!(query.field(), "content");
    assert!(search.queries().is_empty());
}

#[test]
fn resuming_a_checkpoint_matches_a_single_run() {
    let questions = ["Who wrote Hamlet?", "What did Marlowe write?"];

    let search = library();
    let mut first = pipeline(&questions, search.clone(), FailurePolicy::Halt);
    let checkpointed = successful(first.run(Some("query_builder")).unwrap().collect());
    first.close();
    assert!(search.queries().is_empty());

    // Checkpoints survive a trip through storage.
    let stored = serde_json::to_string(&checkpointed).unwrap();
    let restored: Vec<Unit> = serde_json::from_str(&stored).unwrap();

    let mut second = pipeline(&[], library(), FailurePolicy::Halt);
    let resumed = successful(second.resume("query_builder", restored, None).unwrap().collect());

    let mut single = pipeline(&questions, library(), FailurePolicy::Halt);
    let uninterrupted = successful(single.run(None).unwrap().collect());

    assert_eq!(resumed, uninterrupted);
}

#[test]
fn two_indexes_can_be_searched_in_one_run() {
    let settings = Settings::default();
    let archive = Arc::new(PassageIndex::new(vec!["Hamlet wrote a sonnet in the archive."]));

    let mut pipeline = Pipeline::builder()
        .reader(TextReader::new(["Who wrote Hamlet?"]))
        .stage(AnnotationStage::srl(Arc::new(RecordedSrl::new())))
        .stage(Boxer::with_config(settings.boxer))
        .stage(QueryBuilder::new(settings.query_builder))
        .stage(RetrievalStage::new(settings.retrieval, library()))
        .stage(
            RetrievalStage::new(
                RetrievalConfig {
                    result_prefix: "archive".to_string(),
                    ..RetrievalConfig::default()
                },
                archive.clone(),
            )
            .with_name("archive_retrieval"),
        )
        .stage(AnswerStage::new(settings.answer, Arc::new(FirstWord)))
        .failure_policy(FailurePolicy::Halt)
        .build()
        .unwrap();

    let units = successful(pipeline.run(None).unwrap().collect());
    let set = units[0].as_set().unwrap();

    assert_eq!(archive.queries(), vec!["hamlet wrote"]);
    assert_eq!(
        set.keys().collect::<Vec<_>>(),
        vec!["query", "passage_0", "passage_1", "archive_0"]
    );
    assert_eq!(set.answers().len(), 3);
}

#[test]
fn tampered_checkpoint_is_rejected_before_resuming() {
    let mut pipeline = pipeline(&["Who wrote Hamlet?"], library(), FailurePolicy::Halt);
    let checkpointed = successful(pipeline.run(Some("srl")).unwrap().collect());

    let mut stored = serde_json::to_value(&checkpointed).unwrap();
    stored[0]["document"]["annotations"]["token"][0]["span"]["end"] = json!(500);

    let restored = serde_json::from_value::<Vec<Unit>>(stored);
    assert!(restored.unwrap_err().to_string().contains("outside of text"));
}

#[test]
fn nlu_checkpoint_yields_annotated_documents() {
    let mut pipeline = pipeline(&["Who wrote Hamlet?"], library(), FailurePolicy::Halt);

    let units = successful(pipeline.run(Some("srl")).unwrap().collect());
    let doc = units[0].as_document().unwrap();

    assert_eq!(doc.annotations(AnnotationKind::Sentence).len(), 1);

    let tokens: Vec<(&str, Option<&str>, Option<&str>)> = doc
        .annotations(AnnotationKind::Token)
        .iter()
        .map(|token| (doc.covered_text(token), token.pos(), token.lemma()))
        .collect();
    assert_eq!(
        tokens,
        vec![
            ("Who", Some("WP"), Some("who")),
            ("wrote", Some("VBD"), Some("write")),
            ("Hamlet", Some("NNP"), Some("Hamlet")),
            ("?", Some("."), Some("?")),
        ]
    );

    let links: Vec<(&str, &str)> = doc
        .predicate_links()
        .filter_map(|link| {
            let (_, argument) = doc.link_ends(link)?;
            Some((link.arg_type.as_str(), doc.covered_text(argument)))
        })
        .collect();
    assert_eq!(links, vec![("ARG0", "Who"), ("ARG1", "Hamlet")]);
}

#[test]
fn continue_policy_reports_failed_unit_and_moves_on() {
    let mut pipeline = pipeline(
        &["Who wrote Hamlet?", "garbled input", "What did Marlowe write?"],
        library(),
        FailurePolicy::Continue,
    );

    let results: Vec<_> = pipeline.run(None).unwrap().collect();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[2].is_ok());

    let failure = results[1].as_ref().unwrap_err();
    assert_eq!(failure.unit, 1);
    assert_eq!(failure.stage, "srl");
    assert!(!failure.source.is_fatal());
}

#[test]
fn halt_policy_stops_at_first_failed_unit() {
    let mut pipeline = pipeline(
        &["Who wrote Hamlet?", "garbled input", "What did Marlowe write?"],
        library(),
        FailurePolicy::Halt,
    );

    let results: Vec<_> = pipeline.run(None).unwrap().collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[test]
fn unavailable_search_only_blocks_runs_that_reach_it() {
    let search = Arc::new(PassageIndex::unavailable());
    let mut pipeline = pipeline(&["Who wrote Hamlet?"], search, FailurePolicy::Continue);

    let error = pipeline.run(None).err().unwrap();
    match error {
        PipelineError::Initialization { stage, source } => {
            assert_eq!(stage, "retrieval");
            assert!(source.is_fatal());
        }
        other => panic!("unexpected error: {other}"),
    }

    let units = successful(pipeline.run(Some("query_builder")).unwrap().collect());
    assert_eq!(units.len(), 1);
}
