//! Extractive answering with a generative model.

use std::sync::Arc;

use crate::backend::{BackendError, OllamaClientTrait};
use crate::capability::{ExtractedAnswer, QaCapability};

/// Prompt asking for a verbatim answer span.
fn build_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are an extractive question answering system. Answer the question by copying the shortest span of the context that answers it.

CRITICAL RULES:
1. The answer MUST be copied verbatim from the context - do not paraphrase
2. Do not use knowledge outside the context
3. If the context does not answer the question, return an empty answer with score 0.0
4. The score is your confidence (0.0-1.0) that the span answers the question

QUESTION:
{question}

CONTEXT:
{context}

Respond in JSON format:
{{"answer": "span copied from the context", "score": 0.85}}

JSON OUTPUT:"#
    )
}

/// Builder for constructing `LlmExtractor` instances.
#[derive(Default)]
pub struct LlmExtractorBuilder {
    client: Option<Arc<dyn OllamaClientTrait>>,
    model: Option<String>,
}

impl LlmExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generation client to use.
    pub fn client(mut self, client: Arc<dyn OllamaClientTrait>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the model name passed to the client.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the `LlmExtractor`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` was not called.
    #[must_use]
    pub fn build(self) -> LlmExtractor {
        LlmExtractor {
            client: self.client.expect("client must be set via client() method"),
            model: self.model.unwrap_or_default(),
        }
    }
}

/// Answers questions by prompting a model for a span of the context.
///
/// Answers that do not occur verbatim in the context are rejected.
pub struct LlmExtractor {
    client: Arc<dyn OllamaClientTrait>,
    model: String,
}

impl LlmExtractor {
    #[must_use]
    pub fn new(client: Arc<dyn OllamaClientTrait>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl QaCapability for LlmExtractor {
    /// Verifies a model is configured and served by the backend.
    fn init(&self) -> Result<(), BackendError> {
        if self.model.is_empty() {
            return Err(BackendError::api(
                "no model configured; set OLLAMA_MODEL or pass a model explicitly",
            ));
        }

        let models = self.client.list_models()?;
        if !models.iter().any(|m| m == &self.model) {
            return Err(BackendError::api(format!(
                "model `{}` is not available",
                self.model
            )));
        }
        Ok(())
    }

    fn answer(&self, question: &str, context: &str) -> Result<ExtractedAnswer, BackendError> {
        let prompt = build_prompt(question, context);

        let response = self.client.generate(&self.model, &prompt)?;

        let json_str = extract_json(&response)
            .ok_or_else(|| BackendError::api("Failed to extract JSON from model response"))?;
        let answer = parse_answer(&json_str)?;

        if !answer.answer_text.is_empty() && !context.contains(answer.answer_text.as_str()) {
            return Err(BackendError::api(format!(
                "answer `{}` does not occur in the context",
                answer.answer_text
            )));
        }

        Ok(answer)
    }
}

/// Extracts the outermost JSON object from a model response.
fn extract_json(response: &str) -> Option<String> {
    let trimmed = response.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;

    if start <= end {
        Some(trimmed[start..=end].to_string())
    } else {
        None
    }
}

fn parse_answer(json_str: &str) -> Result<ExtractedAnswer, BackendError> {
    let json: serde_json::Value =
        serde_json::from_str(json_str).map_err(BackendError::Serialization)?;

    let obj = json
        .as_object()
        .ok_or_else(|| BackendError::api("Expected JSON object"))?;

    let answer = obj
        .get("answer")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    let score = if answer.is_empty() {
        0.0
    } else {
        obj.get("score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0)
    };

    Ok(ExtractedAnswer::new(answer, score))
}
