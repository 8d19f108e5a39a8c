//! Semantic role labeling through an AllenNLP-style predictor service.
//!
//! The predictor takes `{"sentence": text}` and answers with the words it
//! tokenized and one BIO tag sequence per detected verb. Sentences, tags and
//! lemmas the predictor does not supply come from [`crate::lexicon`].

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use super::client::{BackendError, RetryPolicy, check_status, http_client, retry_with_backoff};
use crate::capability::AnnotationCapability;
use crate::error::AnnotationError;
use crate::lexicon::{self, Tagged};
use crate::models::{Annotation, AnnotationKind, Document, Span};

const DEFAULT_URL: &str = "http://localhost:8000/predict";

/// Predictor response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SrlResponse {
    pub words: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<SrlFrame>,
    /// Part-of-speech tags aligned with `words`, for predictors that return them.
    #[serde(default)]
    pub pos: Vec<String>,
}

/// Tags for one predicate, aligned with `SrlResponse::words`.
#[derive(Debug, Clone, Deserialize)]
pub struct SrlFrame {
    pub verb: String,
    pub tags: Vec<String>,
}

/// Builder for constructing `SrlClient` instances.
#[derive(Debug, Default)]
pub struct SrlClientBuilder {
    url: Option<String>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
}

impl SrlClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full predictor endpoint URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client, falling back to `SRL_URL` and then
    /// `http://localhost:8000/predict` when no URL was given.
    pub fn build(self) -> Result<SrlClient, BackendError> {
        let url = self
            .url
            .or_else(|| std::env::var("SRL_URL").ok())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        let client = http_client(&url, self.timeout.unwrap_or(Duration::from_secs(60)))?;

        Ok(SrlClient {
            client,
            url,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous SRL predictor client implementing [`AnnotationCapability`].
pub struct SrlClient {
    client: reqwest::blocking::Client,
    url: String,
    retry: RetryPolicy,
}

impl SrlClient {
    pub fn url(&self) -> &str {
        &self.url
    }

    fn predict(&self, sentence: &str) -> Result<SrlResponse, BackendError> {
        let body = serde_json::json!({ "sentence": sentence });

        let json: serde_json::Value = retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .map_err(BackendError::from_reqwest)?;

            check_status(response)?
                .json()
                .map_err(BackendError::from_reqwest)
        })?;

        serde_json::from_value(json).map_err(BackendError::Serialization)
    }
}

impl AnnotationCapability for SrlClient {
    fn annotate(
        &self,
        doc: Document,
        kinds: &BTreeSet<AnnotationKind>,
    ) -> Result<Document, AnnotationError> {
        let response = self
            .predict(doc.text())
            .map_err(AnnotationError::Capability)?;
        apply_response(doc, &response, kinds)
    }
}

/// Appends the annotations described by a predictor response.
///
/// Requesting any of the predicate kinds adds mentions, arguments and links
/// together, since links index into the other two.
pub fn apply_response(
    mut doc: Document,
    response: &SrlResponse,
    kinds: &BTreeSet<AnnotationKind>,
) -> Result<Document, AnnotationError> {
    let offsets = align_words(doc.text(), &response.words)?;

    if kinds.contains(&AnnotationKind::Sentence) {
        for sentence in lexicon::sentence_spans(doc.text(), &offsets) {
            doc.add_annotation(Annotation::sentence(sentence.begin, sentence.end))?;
        }
    }

    if kinds.contains(&AnnotationKind::Token) {
        doc.mark_annotated(AnnotationKind::Token);
        for (span, tagged) in offsets.iter().zip(tag_response(response)) {
            doc.add_annotation(Annotation::token(
                span.begin,
                span.end,
                Some(tagged.pos),
                Some(tagged.lemma),
            ))?;
        }
    }

    let wants_frames = [
        AnnotationKind::PredicateMention,
        AnnotationKind::PredicateArgument,
        AnnotationKind::PredicateLink,
    ]
    .iter()
    .any(|kind| kinds.contains(kind));

    if wants_frames {
        doc.mark_annotated(AnnotationKind::PredicateMention);
        doc.mark_annotated(AnnotationKind::PredicateArgument);
        doc.mark_annotated(AnnotationKind::PredicateLink);

        for frame in &response.verbs {
            add_frame(&mut doc, frame, &offsets)?;
        }
    }

    Ok(doc)
}

/// Tags and lemmas for the response words, preferring the predictor's own tags.
fn tag_response(response: &SrlResponse) -> Vec<Tagged> {
    let words: Vec<&str> = response.words.iter().map(String::as_str).collect();

    if response.pos.len() == words.len() && !words.is_empty() {
        return words
            .iter()
            .zip(&response.pos)
            .map(|(word, pos)| Tagged {
                pos: pos.clone(),
                lemma: lexicon::lemmatize(word, pos),
            })
            .collect();
    }

    let mut predicates = vec![false; words.len()];
    for frame in &response.verbs {
        for (i, tag) in frame.tags.iter().enumerate() {
            if matches!(tag.as_str(), "B-V" | "I-V")
                && let Some(flag) = predicates.get_mut(i)
            {
                *flag = true;
            }
        }
    }
    lexicon::tag_words(&words, &predicates)
}

fn add_frame(doc: &mut Document, frame: &SrlFrame, offsets: &[Span]) -> Result<(), AnnotationError> {
    if frame.tags.len() != offsets.len() {
        return Err(AnnotationError::Capability(BackendError::api(format!(
            "frame for `{}` has {} tags for {} words",
            frame.verb,
            frame.tags.len(),
            offsets.len()
        ))));
    }

    let labeled = bio_spans(&frame.tags);

    let Some((_, verb_words)) = labeled.iter().find(|(label, _)| label == "V") else {
        tracing::debug!(verb = %frame.verb, "frame has no V tag; skipping");
        return Ok(());
    };

    let verb_span = word_span(offsets, *verb_words);
    let parent = doc.add_annotation(Annotation::predicate(verb_span.begin, verb_span.end))?;

    for (label, words) in labeled.iter().filter(|(label, _)| label != "V") {
        let arg_span = word_span(offsets, *words);
        let child = doc.add_annotation(Annotation::argument(arg_span.begin, arg_span.end))?;
        doc.add_annotation(Annotation::link(
            verb_span.cover(&arg_span),
            parent,
            child,
            label.as_str(),
        ))?;
    }

    Ok(())
}

/// Locates each word in `text`, scanning left to right.
fn align_words(text: &str, words: &[String]) -> Result<Vec<Span>, AnnotationError> {
    let mut cursor = 0;
    let mut spans = Vec::with_capacity(words.len());

    for word in words {
        let found = text[cursor..]
            .find(word.as_str())
            .ok_or_else(|| AnnotationError::Alignment { word: word.clone() })?;
        let begin = cursor + found;
        let end = begin + word.len();
        spans.push(Span::new(begin, end));
        cursor = end;
    }

    Ok(spans)
}

/// Groups BIO tags into `(label, (first_word, last_word))` runs.
fn bio_spans(tags: &[String]) -> Vec<(String, (usize, usize))> {
    let mut spans: Vec<(String, (usize, usize))> = Vec::new();
    let mut open = false;

    for (i, tag) in tags.iter().enumerate() {
        if let Some(label) = tag.strip_prefix("I-")
            && open
            && let Some((current, (_, end))) = spans.last_mut()
            && current.as_str() == label
        {
            *end = i;
            continue;
        }

        match tag.strip_prefix("B-").or_else(|| tag.strip_prefix("I-")) {
            Some(label) => {
                spans.push((label.to_string(), (i, i)));
                open = true;
            }
            None => open = false,
        }
    }

    spans
}

fn word_span(offsets: &[Span], (first, last): (usize, usize)) -> Span {
    Span::new(offsets[first].begin, offsets[last].end)
}
