//! Ollama text generation client.
//!
//! Used by [`crate::answerer::LlmExtractor`] to run extractive question
//! answering on a local model.

use std::time::Duration;

use super::client::{BackendError, RetryPolicy, check_status, http_client, retry_with_backoff};

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use qapipe::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.2:3b")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.2:3b");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    retry: Option<RetryPolicy>,
}

impl OllamaClientBuilder {
    /// Creates a new `OllamaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name for Ollama API calls.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Builds the `OllamaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, defaulting to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL`
    /// is used, defaulting to an empty string.
    pub fn build(self) -> Result<OllamaClient, BackendError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let model = self
            .model
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_default();

        let client = http_client(&base_url, Duration::from_secs(60))?;

        Ok(OllamaClient {
            client,
            base_url,
            model,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous HTTP client for the Ollama API.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

/// Trait for text generation backends.
///
/// This trait enables mocking in unit tests.
pub trait OllamaClientTrait: Send + Sync {
    /// Generates a completion for `prompt` with `model`.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError>;

    /// Lists the models the backend can serve.
    fn list_models(&self) -> Result<Vec<String>, BackendError>;
}

impl OllamaClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl OllamaClientTrait for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "format": "json"
        });

        retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(BackendError::from_reqwest)?;

            let json: serde_json::Value = check_status(response)?
                .json()
                .map_err(BackendError::from_reqwest)?;

            json.get("response")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| BackendError::api("Missing 'response' field in API response"))
        })
    }

    /// Fetches `/api/tags` and returns model names.
    fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let json: serde_json::Value = retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(BackendError::from_reqwest)?;
            check_status(response)?
                .json()
                .map_err(BackendError::from_reqwest)
        })?;

        Ok(json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|model| model.get("name").and_then(|n| n.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }
}
